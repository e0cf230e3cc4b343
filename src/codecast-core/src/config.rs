//! Configuration module for loading TOML config files.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub generation: GenerationConfig,
    pub speech: SpeechConfig,
    pub audio: AudioConfig,
    pub limits: LimitsConfig,
    pub complexity: ComplexityConfig,
    pub prompts: PromptsConfig,
}

/// Settings for the generative text service.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Chat model used for narration.
    pub model: String,
    /// OpenAI-compatible API base URL.
    pub api_base: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Attempts on transient failures (rate limit, network).
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            max_tokens: 4096,
            temperature: 0.7,
            max_retries: 3,
            timeout_secs: 120,
        }
    }
}

/// Settings for the speech engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub voice: String,
    /// Longest text handed to the engine in one call.
    pub max_chunk_chars: usize,
    /// Pause inserted between engine chunks of one segment.
    pub chunk_pause_ms: u32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            voice: "pf_dora".to_string(),
            max_chunk_chars: 200,
            chunk_pause_ms: 300,
        }
    }
}

/// Settings for audio assembly.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate of the final track.
    pub sample_rate: u32,
    /// Short clip inserted at cue markers. `None` disables cues.
    pub cue_path: Option<PathBuf>,
    pub cue_max_ms: u32,
    /// Fraction of the trimmed cue covered by the fade-out.
    pub cue_fade_fraction: f32,
    /// Silence appended after every narration clip.
    pub gap_ms: u32,
    /// Window used when scanning for trailing silence.
    pub silence_window_ms: u32,
    /// Windows quieter than the track average minus this many dB count as silence.
    pub silence_offset_db: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 24_000,
            cue_path: None,
            cue_max_ms: 5_000,
            cue_fade_fraction: 0.3,
            gap_ms: 500,
            silence_window_ms: 10,
            silence_offset_db: 16.0,
        }
    }
}

/// Caps on what is fetched and what is sent to the generative service.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Files whose content is downloaded; the rest are only listed.
    pub max_content_files: usize,
    pub max_file_chars: usize,
    pub readme_preview_chars: usize,
    pub snippet_chars: usize,
    pub total_snippet_chars: usize,
    pub max_listed_files: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_content_files: 50,
            max_file_chars: 15_000,
            readme_preview_chars: 3_000,
            snippet_chars: 1_000,
            total_snippet_chars: 15_000,
            max_listed_files: 100,
        }
    }
}

/// Weights and thresholds of the complexity score.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ComplexityConfig {
    /// Weight of `log10(code_chars / code_floor)`.
    pub code_weight: f64,
    pub code_floor: u64,
    /// Weight of `log10(file_count / file_floor)`.
    pub file_weight: f64,
    pub file_floor: u64,
    /// Bonus per language beyond the first.
    pub language_bonus: f64,
    /// README shorter than this is considered missing.
    pub sparse_readme_chars: u64,
    /// Multiplier applied to the code term when the README is sparse.
    pub sparse_readme_factor: f64,
    pub rich_readme_chars: u64,
    pub rich_readme_bonus: f64,
    /// Scores below this are `Simple`.
    pub simple_below: f64,
    /// Scores above this are `Complex`.
    pub complex_above: f64,
}

impl Default for ComplexityConfig {
    fn default() -> Self {
        Self {
            code_weight: 2.0,
            code_floor: 1_000,
            file_weight: 2.0,
            file_floor: 10,
            language_bonus: 0.5,
            sparse_readme_chars: 200,
            sparse_readme_factor: 0.85,
            rich_readme_chars: 5_000,
            rich_readme_bonus: 0.5,
            simple_below: 4.0,
            complex_above: 9.0,
        }
    }
}

/// Narration prompt templates.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    pub concise: String,
    pub detailed: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            concise: DEFAULT_CONCISE_PROMPT.to_string(),
            detailed: DEFAULT_DETAILED_PROMPT.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| PipelineError::Config(format!("Failed to read config: {}", e)))?;

        Self::from_str(&content)
    }

    /// Load configuration from string content.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, PipelineError> {
        let config: Config = toml::from_str(content)
            .map_err(|e| PipelineError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.complexity.simple_below > self.complexity.complex_above {
            return Err(PipelineError::Config(format!(
                "complexity.simple_below ({}) must not exceed complexity.complex_above ({})",
                self.complexity.simple_below, self.complexity.complex_above
            )));
        }
        self.complexity.validate()?;
        if self.audio.sample_rate == 0 {
            return Err(PipelineError::Config("audio.sample_rate must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.audio.cue_fade_fraction) {
            return Err(PipelineError::Config(format!(
                "audio.cue_fade_fraction must be within [0, 1], got {}",
                self.audio.cue_fade_fraction
            )));
        }
        if self.speech.max_chunk_chars == 0 {
            return Err(PipelineError::Config(
                "speech.max_chunk_chars must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl ComplexityConfig {
    /// Weights that keep the score non-decreasing in every metric.
    fn validate(&self) -> Result<(), PipelineError> {
        for (name, value) in [
            ("code_weight", self.code_weight),
            ("file_weight", self.file_weight),
            ("language_bonus", self.language_bonus),
            ("rich_readme_bonus", self.rich_readme_bonus),
        ] {
            if value.is_nan() || value < 0.0 {
                return Err(PipelineError::Config(format!(
                    "complexity.{} must not be negative, got {}",
                    name, value
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.sparse_readme_factor) {
            return Err(PipelineError::Config(format!(
                "complexity.sparse_readme_factor must be within [0, 1], got {}",
                self.sparse_readme_factor
            )));
        }
        Ok(())
    }
}

/// Default configuration embedded in the binary.
pub fn default_config() -> Config {
    Config::default()
}

const DEFAULT_CONCISE_PROMPT: &str = r#"Você é o roteirista do podcast 'Código Aberto Explica'. Crie um roteiro CURTO (2 a 3 minutos de fala), didático e em português do Brasil, apresentando um repositório do GitHub para desenvolvedores júnior.

Repositório:
- URL: {url}
- Proprietário: {owner}
- Nome: {name}
- Branch: {branch}

Dados coletados (resumo e amostras):
```json
{context}
```

Cubra rapidamente:
1. O propósito do projeto.
2. As tecnologias principais.
3. Uma dica prática para quem quer começar a estudar o código.

Formato:
- Comece com [VINHETA DE ABERTURA] e termine com [VINHETA DE ENCERRAMENTO].
- Use [MÚSICA SUAVE DE FUNDO] no máximo uma vez, como transição.
- Indique o locutor como "LOCUTOR:".
- Não invente detalhes que não estejam nos dados.

Comece o roteiro agora:
[VINHETA DE ABERTURA]

LOCUTOR: Olá, desenvolvedor e desenvolvedora! Bem-vindos ao Código Aberto Explica...
"#;

const DEFAULT_DETAILED_PROMPT: &str = r#"Você é o roteirista do podcast 'Código Aberto Explica'. Sua missão é criar um roteiro didático e engajador em português do Brasil explicando um repositório do GitHub para desenvolvedores júnior.

Repositório:
- URL: {url}
- Proprietário: {owner}
- Nome: {name}
- Branch: {branch}

Dados coletados (resumo e amostras):
```json
{context}
```

Roteiro de aproximadamente 5 a 7 minutos de fala, cobrindo:
1. Propósito: qual problema o projeto resolve?
2. Estrutura e arquitetura: como o código está organizado, quais são os arquivos principais e a lógica geral?
3. Tecnologias chave: linguagens, frameworks e bibliotecas importantes.
4. Para o júnior: dois ou três conceitos necessários para trabalhar com um código como este, os primeiros passos para construir algo parecido e boas práticas visíveis nas amostras.
5. Como aprender mais: clonar, rodar, ler a documentação, contribuir com uma issue pequena.

Formato:
- Use [VINHETA DE ABERTURA] e [VINHETA DE ENCERRAMENTO].
- Use [MÚSICA SUAVE DE FUNDO] nas transições entre seções.
- Indique o locutor como "LOCUTOR:".
- Linguagem acessível e motivadora; explique jargões brevemente.
- Não invente detalhes que não estejam nos dados. Se algo não estiver claro, admita ("Parece que...", "Pela estrutura, podemos inferir...").

Comece o roteiro agora:
[VINHETA DE ABERTURA]

LOCUTOR: Olá, desenvolvedor e desenvolvedora! Bem-vindos ao Código Aberto Explica...
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = Config::from_str(
            r#"
            [generation]
            model = "llama3:8b"

            [audio]
            gap_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.generation.model, "llama3:8b");
        assert_eq!(config.generation.max_retries, 3);
        assert_eq!(config.audio.gap_ms, 250);
        assert_eq!(config.audio.sample_rate, 24_000);
        assert!(config.prompts.detailed.contains("{context}"));
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let result = Config::from_str(
            r#"
            [complexity]
            simple_below = 10.0
            complex_above = 5.0
            "#,
        );
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_score_breaking_weights_rejected() {
        for section in [
            "sparse_readme_factor = 1.5",
            "sparse_readme_factor = -0.1",
            "language_bonus = -1.0",
            "code_weight = -2.0",
            "file_weight = -0.5",
            "rich_readme_bonus = -0.5",
        ] {
            let result = Config::from_str(&format!("[complexity]\n{}\n", section));
            assert!(
                matches!(result, Err(PipelineError::Config(_))),
                "{section} should be rejected"
            );
        }
    }

    #[test]
    fn test_zero_weights_accepted() {
        let config = Config::from_str(
            "[complexity]\nlanguage_bonus = 0.0\nsparse_readme_factor = 1.0\n",
        )
        .unwrap();
        assert_eq!(config.complexity.language_bonus, 0.0);
    }

    #[test]
    fn test_no_cue_by_default() {
        assert_eq!(default_config().audio.cue_path, None);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codecast.toml");
        fs::write(&path, "[speech]\nvoice = \"pm_alex\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.speech.voice, "pm_alex");
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = Config::load("/nonexistent/codecast.toml");
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_default_prompts_carry_cue_markers() {
        let config = default_config();
        for prompt in [&config.prompts.concise, &config.prompts.detailed] {
            assert!(prompt.contains("[VINHETA DE ABERTURA]"));
            assert!(prompt.contains("[VINHETA DE ENCERRAMENTO]"));
        }
    }
}
