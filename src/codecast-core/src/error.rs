//! Error types for the podcast pipeline.

use thiserror::Error;

/// Failures while collecting repository data. Fatal to the whole run.
#[derive(Error, Debug)]
pub enum CollectionError {
    #[error("Invalid GitHub URL: {0}")]
    InvalidUrl(String),

    #[error("Repository or branch not found: {0}")]
    NotFound(String),

    #[error("Access denied (check GITHUB_TOKEN for private repositories): {0}")]
    Forbidden(String),

    #[error("GitHub API rate limit reached: {0}")]
    RateLimited(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response from GitHub: {0}")]
    Decode(String),
}

/// Failures from the generative text service.
///
/// Never surfaced as a run failure: the narration requestor turns every
/// variant into a fallback narration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationFailure {
    #[error("Generation blocked: {0}")]
    Blocked(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Unknown generation error: {0}")]
    Unknown(String),
}

impl GenerationFailure {
    /// Whether a retry has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GenerationFailure::RateLimited(_) | GenerationFailure::NetworkError(_)
        )
    }
}

/// Failures synthesizing or decoding a single narration segment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthesisFailure {
    #[error("Speech engine error: {0}")]
    Engine(String),

    #[error("Audio decode error: {0}")]
    Decode(String),
}

/// Failures of the audio assembly run as a whole.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyFailure {
    #[error("No audio was produced for any segment")]
    NoAudioProduced,

    #[error("Failed to encode audio: {0}")]
    Encode(String),
}

/// The single failure reason a pipeline run can end with.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Collection(#[from] CollectionError),

    #[error("The narration script has nothing to narrate")]
    EmptyScript,

    #[error(transparent)]
    Assembly(#[from] AssemblyFailure),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TTS error: {0}")]
    Tts(String),
}
