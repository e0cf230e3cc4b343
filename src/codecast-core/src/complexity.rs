//! Repository complexity classification.
//!
//! The score is a weighted sum of logarithmic size terms, a per-language
//! bonus and a README adjustment. It is non-decreasing in every metric, so
//! growing a repository can never make it look simpler.

use serde::Serialize;
use std::fmt;

use crate::config::ComplexityConfig;
use crate::repository::RepositoryMetrics;

/// Coarse size class of a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ComplexityLevel {
    Simple,
    Medium,
    Complex,
}

impl fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComplexityLevel::Simple => "simple",
            ComplexityLevel::Medium => "medium",
            ComplexityLevel::Complex => "complex",
        };
        f.write_str(name)
    }
}

/// Deterministic metrics-to-level classifier.
#[derive(Debug, Clone)]
pub struct ComplexityClassifier {
    config: ComplexityConfig,
}

impl Default for ComplexityClassifier {
    fn default() -> Self {
        Self::new(ComplexityConfig::default())
    }
}

impl ComplexityClassifier {
    pub fn new(config: ComplexityConfig) -> Self {
        Self { config }
    }

    /// Scalar size score for `metrics`.
    pub fn score(&self, metrics: &RepositoryMetrics) -> f64 {
        let c = &self.config;

        let mut code_term = log_term(metrics.code_char_count, c.code_floor, c.code_weight);
        if metrics.readme_char_count < c.sparse_readme_chars {
            // Scaling keeps the term non-decreasing in code size and zero for trivial code.
            code_term *= c.sparse_readme_factor;
        }

        let file_term = log_term(metrics.file_count, c.file_floor, c.file_weight);
        let language_term = metrics.language_count.saturating_sub(1) as f64 * c.language_bonus;
        let readme_term = if metrics.readme_char_count >= c.rich_readme_chars {
            c.rich_readme_bonus
        } else {
            0.0
        };

        code_term + file_term + language_term + readme_term
    }

    /// Level for an already computed score.
    ///
    /// Both thresholds belong to `Medium`.
    pub fn level_for_score(&self, score: f64) -> ComplexityLevel {
        if score < self.config.simple_below {
            ComplexityLevel::Simple
        } else if score > self.config.complex_above {
            ComplexityLevel::Complex
        } else {
            ComplexityLevel::Medium
        }
    }

    pub fn classify(&self, metrics: &RepositoryMetrics) -> ComplexityLevel {
        self.level_for_score(self.score(metrics))
    }
}

/// `weight * log10(value / floor)`, zero at or below the floor.
fn log_term(value: u64, floor: u64, weight: f64) -> f64 {
    let floor = floor.max(1);
    if value <= floor {
        return 0.0;
    }
    weight * (value as f64 / floor as f64).log10()
}
