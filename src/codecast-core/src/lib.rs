//! Codecast Core Library
//!
//! Turns a public GitHub repository into a narrated podcast episode:
//! repository collection and complexity classification, narration
//! generation with a local fallback, script segmentation and audio
//! assembly.

pub mod assembly;
pub mod audio;
pub mod collector;
pub mod complexity;
pub mod config;
pub mod error;
pub mod narration;
pub mod pipeline;
pub mod progress;
pub mod repository;
pub mod script;
pub mod template;
pub mod tts;

pub use assembly::{AudioAssembler, CueClip, PodcastAssembly};
pub use collector::{GitHubCollector, RepositoryLocation, RepositorySource};
pub use complexity::{ComplexityClassifier, ComplexityLevel};
pub use config::Config;
pub use error::{
    AssemblyFailure, CollectionError, GenerationFailure, PipelineError, SynthesisFailure,
};
pub use narration::{Narration, NarrationGenerator, NarrationRequestor, NarrationSource, OpenAiNarrator};
pub use pipeline::{PodcastOutput, PodcastPipeline, ScriptOutcome, output_filename};
pub use progress::{ProgressCallback, ProgressEvent, ProgressReporter};
pub use repository::{RepositoryIdentity, RepositoryMetrics, RepositorySnapshot};
pub use script::{CueKind, ScriptSegment, SegmentKind, segment_script};
pub use template::NarrationTemplate;
pub use tts::{KokoroSynthesizer, SpeechSynthesizer};
