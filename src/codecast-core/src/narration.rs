//! Narration generation.
//!
//! The requestor sends the rendered template to a generative text service
//! and, whatever goes wrong, still returns a narration: failures are turned
//! into a locally built fallback script that uses the same cue markers.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs, FinishReason,
};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

#[cfg(test)]
use mockall::automock;

use crate::config::{GenerationConfig, PromptsConfig};
use crate::error::GenerationFailure;
use crate::repository::{RepositoryIdentity, RepositorySummary};
use crate::script::{CLOSING_CUE, OPENING_CUE, TRANSITION_CUE};
use crate::template::NarrationTemplate;

const SYSTEM_PROMPT: &str = "Você escreve roteiros de podcast em português do Brasil. \
Responda apenas com o roteiro, usando os marcadores entre colchetes indicados.";

/// Generative text collaborator.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NarrationGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationFailure>;
}

/// Generator for any OpenAI-compatible chat completion endpoint.
pub struct OpenAiNarrator {
    config: GenerationConfig,
    api_key: String,
}

impl OpenAiNarrator {
    pub fn new(config: GenerationConfig, api_key: impl Into<String>) -> Self {
        Self {
            config,
            api_key: api_key.into(),
        }
    }

    fn client(&self) -> Result<Client<OpenAIConfig>, GenerationFailure> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                GenerationFailure::NetworkError(format!("Failed to create HTTP client: {}", e))
            })?;

        let openai_config = OpenAIConfig::new()
            .with_api_key(&self.api_key)
            .with_api_base(&self.config.api_base);

        Ok(Client::with_config(openai_config).with_http_client(http_client))
    }

    async fn attempt(
        &self,
        client: &Client<OpenAIConfig>,
        prompt: &str,
    ) -> Result<String, GenerationFailure> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.config.model)
            .max_completion_tokens(self.config.max_tokens)
            .temperature(self.config.temperature)
            .messages(vec![
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: SYSTEM_PROMPT.into(),
                    name: None,
                }),
                ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                    content: prompt.into(),
                    name: None,
                }),
            ])
            .build()
            .map_err(classify_openai_error)?;

        let response = client
            .chat()
            .create(request)
            .await
            .map_err(classify_openai_error)?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| GenerationFailure::Blocked("No candidates returned".to_string()))?;

        if matches!(choice.finish_reason, Some(FinishReason::ContentFilter)) {
            return Err(GenerationFailure::Blocked(
                "Content filtered by the provider".to_string(),
            ));
        }

        match choice.message.content.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => Ok(text.to_string()),
            _ => Err(GenerationFailure::Blocked("Empty completion".to_string())),
        }
    }
}

#[async_trait]
impl NarrationGenerator for OpenAiNarrator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationFailure> {
        if self.api_key.trim().is_empty() {
            return Err(GenerationFailure::InvalidCredential(
                "No API key configured".to_string(),
            ));
        }

        let client = self.client()?;
        let max_retries = self.config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 0..max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            match self.attempt(&client, prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() => {
                    tracing::warn!(attempt = attempt + 1, max_retries, error = %e, "Transient generation failure");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| GenerationFailure::Unknown("No attempt was made".to_string())))
    }
}

/// Map a client error onto the failure taxonomy.
fn classify_openai_error(error: OpenAIError) -> GenerationFailure {
    match error {
        OpenAIError::Reqwest(e) => {
            let detail = e.to_string();
            match e.status().map(|s| s.as_u16()) {
                Some(401) | Some(403) => GenerationFailure::InvalidCredential(detail),
                Some(429) => GenerationFailure::RateLimited(detail),
                _ => GenerationFailure::NetworkError(detail),
            }
        }
        OpenAIError::ApiError(api) => classify_api_message(&api.to_string()),
        other => GenerationFailure::Unknown(other.to_string()),
    }
}

fn classify_api_message(message: &str) -> GenerationFailure {
    let lower = message.to_lowercase();
    if lower.contains("api key") || lower.contains("api_key") || lower.contains("unauthorized")
        || lower.contains("authentication")
    {
        GenerationFailure::InvalidCredential(message.to_string())
    } else if lower.contains("rate limit") || lower.contains("quota") || lower.contains("429") {
        GenerationFailure::RateLimited(message.to_string())
    } else if (lower.contains("content") && (lower.contains("policy") || lower.contains("filter")))
        || lower.contains("safety")
    {
        GenerationFailure::Blocked(message.to_string())
    } else {
        GenerationFailure::Unknown(message.to_string())
    }
}

/// Where a narration came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NarrationSource {
    Generated,
    Fallback(String),
}

#[derive(Debug, Clone)]
pub struct Narration {
    pub text: String,
    pub source: NarrationSource,
}

impl Narration {
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, NarrationSource::Fallback(_))
    }
}

/// Sends narration requests and degrades to a local script on failure.
pub struct NarrationRequestor {
    generator: Box<dyn NarrationGenerator>,
    prompts: PromptsConfig,
}

impl NarrationRequestor {
    pub fn new(generator: Box<dyn NarrationGenerator>, prompts: PromptsConfig) -> Self {
        Self { generator, prompts }
    }

    /// Request a narration. Never fails.
    pub async fn request(
        &self,
        template: NarrationTemplate,
        identity: &RepositoryIdentity,
        summary: &RepositorySummary,
        context: &str,
    ) -> Narration {
        let prompt = template.render(&self.prompts, identity, context);
        tracing::info!(
            template = template.display_name(),
            prompt_chars = prompt.chars().count(),
            "Requesting narration"
        );

        match self.generator.generate(&prompt).await {
            Ok(text) => Narration {
                text: with_footer(&text, identity),
                source: NarrationSource::Generated,
            },
            Err(failure) => {
                tracing::warn!(error = %failure, "Narration generation failed, using fallback script");
                Narration {
                    text: fallback_narration(identity, summary, &failure),
                    source: NarrationSource::Fallback(failure.to_string()),
                }
            }
        }
    }
}

/// Close the script and attach the metadata block shown with the download.
fn with_footer(text: &str, identity: &RepositoryIdentity) -> String {
    let mut script = text.trim().to_string();
    if !script.contains(CLOSING_CUE) {
        script.push_str("\n\n");
        script.push_str(CLOSING_CUE);
    }
    script.push_str(&format!(
        "\n\n---\nRoteiro gerado por Código Aberto Explica.\nRepositório analisado: {}\n",
        identity.url
    ));
    script
}

fn failure_phrase(failure: &GenerationFailure) -> &'static str {
    match failure {
        GenerationFailure::Blocked(_) => "o conteúdo foi bloqueado pela política de segurança da IA",
        GenerationFailure::RateLimited(_) => "o serviço de IA atingiu o limite de requisições",
        GenerationFailure::InvalidCredential(_) => "a chave de acesso ao serviço de IA não é válida",
        GenerationFailure::NetworkError(_) => "não conseguimos nos comunicar com o serviço de IA",
        GenerationFailure::Unknown(_) => "o serviço de IA apresentou um erro inesperado",
    }
}

/// Fixed-structure script built only from what is already known.
pub fn fallback_narration(
    identity: &RepositoryIdentity,
    summary: &RepositorySummary,
    failure: &GenerationFailure,
) -> String {
    let title = if summary.title.trim().is_empty() {
        identity.name.as_str()
    } else {
        summary.title.as_str()
    };
    let main_language = summary.main_language().unwrap_or("código");
    let description = if summary.description.trim().is_empty() {
        "Não foi possível carregar a descrição."
    } else {
        summary.description.as_str()
    };

    format!(
        "{OPENING_CUE}\n\n\
         LOCUTOR: Olá! Bem-vindos ao Código Aberto Explica! Hoje tivemos um pequeno problema técnico, \
         {reason}, então não conseguimos analisar a fundo o repositório {title}. Mas vamos dar uma olhada geral \
         com as informações que temos!\n\n\
         {TRANSITION_CUE}\n\n\
         LOCUTOR: O repositório de hoje é o {title}, mantido por {owner}. Pelo que vimos, parece ser um projeto \
         escrito principalmente em {main_language}.\n\n\
         LOCUTOR: A descrição diz o seguinte: {description}\n\n\
         LOCUTOR: A dica para o júnior hoje é: sempre comece explorando o README! Ele é o cartão de visitas do \
         projeto. Depois, olhe a estrutura de pastas e tente rodar o projeto localmente.\n\n\
         {CLOSING_CUE}\n\
         ---\n\
         Roteiro de exemplo gerado devido a erro.\n\
         Repositório: {url}\n",
        reason = failure_phrase(failure),
        owner = identity.owner,
        url = identity.url,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{CueKind, SegmentKind, segment_script};

    fn identity() -> RepositoryIdentity {
        RepositoryIdentity {
            owner: "octo".to_string(),
            name: "widgets".to_string(),
            branch: "main".to_string(),
            url: "https://github.com/octo/widgets".to_string(),
        }
    }

    fn summary() -> RepositorySummary {
        RepositorySummary {
            title: "Widget Factory".to_string(),
            owner: "octo".to_string(),
            url: "https://github.com/octo/widgets".to_string(),
            branch: "main".to_string(),
            description: "Builds widgets from parts.".to_string(),
            languages: vec![("rs".to_string(), 3)],
            file_count: 3,
            key_files: vec![],
        }
    }

    fn prompts() -> PromptsConfig {
        PromptsConfig {
            concise: "CONCISE {name}".to_string(),
            detailed: "DETAILED {name}".to_string(),
        }
    }

    #[tokio::test]
    async fn test_generated_text_gets_footer() {
        let mut generator = MockNarrationGenerator::new();
        generator
            .expect_generate()
            .withf(|prompt: &str| prompt == "DETAILED widgets")
            .times(1)
            .returning(|_| Ok("[VINHETA DE ABERTURA]\nLOCUTOR: Oi.".to_string()));

        let requestor = NarrationRequestor::new(Box::new(generator), prompts());
        let narration = requestor
            .request(NarrationTemplate::Detailed, &identity(), &summary(), "{}")
            .await;

        assert_eq!(narration.source, NarrationSource::Generated);
        assert!(narration.text.contains(CLOSING_CUE));
        assert!(narration.text.contains("Repositório analisado: https://github.com/octo/widgets"));

        let segments = segment_script(&narration.text).unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[2].kind, SegmentKind::Cue(CueKind::Closing));
    }

    #[tokio::test]
    async fn test_existing_closing_cue_not_duplicated() {
        let mut generator = MockNarrationGenerator::new();
        generator
            .expect_generate()
            .returning(|_| Ok("LOCUTOR: Tchau.\n[VINHETA DE ENCERRAMENTO]".to_string()));

        let requestor = NarrationRequestor::new(Box::new(generator), prompts());
        let narration = requestor
            .request(NarrationTemplate::Concise, &identity(), &summary(), "{}")
            .await;

        assert_eq!(narration.text.matches(CLOSING_CUE).count(), 1);
    }

    #[tokio::test]
    async fn test_every_failure_falls_back() {
        let failures = [
            GenerationFailure::Blocked("b".to_string()),
            GenerationFailure::RateLimited("r".to_string()),
            GenerationFailure::InvalidCredential("k".to_string()),
            GenerationFailure::NetworkError("n".to_string()),
            GenerationFailure::Unknown("u".to_string()),
        ];

        for failure in failures {
            let mut generator = MockNarrationGenerator::new();
            let returned = failure.clone();
            generator
                .expect_generate()
                .times(1)
                .returning(move |_| Err(returned.clone()));

            let requestor = NarrationRequestor::new(Box::new(generator), prompts());
            let narration = requestor
                .request(NarrationTemplate::Concise, &identity(), &summary(), "{}")
                .await;

            assert!(narration.is_fallback());
            assert_eq!(narration.source, NarrationSource::Fallback(failure.to_string()));
            assert!(narration.text.contains("Widget Factory"));
        }
    }

    #[test]
    fn test_fallback_segments_cleanly() {
        let text = fallback_narration(
            &identity(),
            &summary(),
            &GenerationFailure::NetworkError("timeout".to_string()),
        );
        let segments = segment_script(&text).unwrap();

        assert_eq!(segments.first().unwrap().kind, SegmentKind::Cue(CueKind::Opening));
        assert_eq!(segments.last().unwrap().kind, SegmentKind::Cue(CueKind::Closing));
        assert!(segments.iter().any(|s| s.kind == SegmentKind::Cue(CueKind::Transition)));

        let spoken: Vec<&str> = segments.iter().filter_map(|s| s.narration_text()).collect();
        assert_eq!(spoken.len(), 2);
        assert!(spoken.iter().all(|t| !t.contains("LOCUTOR")));
        assert!(spoken[1].contains("escrito principalmente em rs"));
        assert!(!spoken.iter().any(|t| t.contains("Roteiro de exemplo")));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_invalid_credential() {
        let narrator = OpenAiNarrator::new(GenerationConfig::default(), "  ");
        let result = narrator.generate("prompt").await;
        assert!(matches!(result, Err(GenerationFailure::InvalidCredential(_))));
    }

    #[test]
    fn test_classify_api_messages() {
        assert!(matches!(
            classify_api_message("Incorrect API key provided"),
            GenerationFailure::InvalidCredential(_)
        ));
        assert!(matches!(
            classify_api_message("Rate limit reached for requests"),
            GenerationFailure::RateLimited(_)
        ));
        assert!(matches!(
            classify_api_message("Your request was rejected by the content filter policy"),
            GenerationFailure::Blocked(_)
        ));
        assert!(matches!(
            classify_api_message("The server had an error"),
            GenerationFailure::Unknown(_)
        ));
    }
}
