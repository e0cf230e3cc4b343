//! Narration template selection.

use serde::Serialize;

use crate::complexity::ComplexityLevel;
use crate::config::PromptsConfig;
use crate::repository::RepositoryIdentity;

/// The two narration styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NarrationTemplate {
    Concise,
    Detailed,
}

impl NarrationTemplate {
    /// Only complex repositories get the detailed treatment.
    pub fn for_level(level: ComplexityLevel) -> Self {
        match level {
            ComplexityLevel::Complex => NarrationTemplate::Detailed,
            ComplexityLevel::Simple | ComplexityLevel::Medium => NarrationTemplate::Concise,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            NarrationTemplate::Concise => "concise",
            NarrationTemplate::Detailed => "detailed",
        }
    }

    /// Get the prompt for this template, with placeholders replaced.
    pub fn render(
        &self,
        prompts: &PromptsConfig,
        identity: &RepositoryIdentity,
        context: &str,
    ) -> String {
        let template = match self {
            NarrationTemplate::Concise => &prompts.concise,
            NarrationTemplate::Detailed => &prompts.detailed,
        };

        // Context goes last so repository text cannot inject placeholders.
        template
            .replace("{owner}", &identity.owner)
            .replace("{name}", &identity.name)
            .replace("{branch}", &identity.branch)
            .replace("{url}", &identity.url)
            .replace("{context}", context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> RepositoryIdentity {
        RepositoryIdentity {
            owner: "octo".to_string(),
            name: "widgets".to_string(),
            branch: "dev".to_string(),
            url: "https://github.com/octo/widgets".to_string(),
        }
    }

    #[test]
    fn test_level_mapping() {
        assert_eq!(
            NarrationTemplate::for_level(ComplexityLevel::Complex),
            NarrationTemplate::Detailed
        );
        assert_eq!(
            NarrationTemplate::for_level(ComplexityLevel::Medium),
            NarrationTemplate::Concise
        );
        assert_eq!(
            NarrationTemplate::for_level(ComplexityLevel::Simple),
            NarrationTemplate::Concise
        );
    }

    #[test]
    fn test_render_fills_placeholders() {
        let prompts = PromptsConfig {
            concise: "{owner}/{name}@{branch} {url} :: {context}".to_string(),
            detailed: "detailed {name}".to_string(),
        };

        let rendered = NarrationTemplate::Concise.render(&prompts, &identity(), "{\"a\":1}");
        assert_eq!(
            rendered,
            "octo/widgets@dev https://github.com/octo/widgets :: {\"a\":1}"
        );
        assert_eq!(
            NarrationTemplate::Detailed.render(&prompts, &identity(), ""),
            "detailed widgets"
        );
    }

    #[test]
    fn test_context_placeholders_left_alone() {
        let prompts = PromptsConfig {
            concise: "{context}".to_string(),
            detailed: String::new(),
        };
        let rendered = NarrationTemplate::Concise.render(&prompts, &identity(), "literal {owner}");
        assert_eq!(rendered, "literal {owner}");
    }
}
