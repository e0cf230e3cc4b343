//! Podcast pipeline orchestration.
//!
//! Runs the stages strictly in sequence: collect, measure, classify, pick a
//! template, narrate, segment, assemble. Progress is reported through an
//! optional callback and never drives control flow.

use serde::Serialize;

use crate::assembly::{AudioAssembler, PodcastAssembly};
use crate::collector::RepositorySource;
use crate::complexity::{ComplexityClassifier, ComplexityLevel};
use crate::config::Config;
use crate::error::PipelineError;
use crate::narration::{NarrationGenerator, NarrationRequestor, NarrationSource};
use crate::progress::{ProgressCallback, ProgressReporter};
use crate::repository::{
    self, MetricsAccumulator, RepositoryIdentity, RepositoryMetrics, RepositorySnapshot,
};
use crate::script::{self, ScriptSegment};
use crate::template::NarrationTemplate;
use crate::tts::SpeechSynthesizer;

/// What the narration stage produced, before any audio work.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptOutcome {
    pub identity: RepositoryIdentity,
    pub metrics: RepositoryMetrics,
    pub score: f64,
    pub complexity: ComplexityLevel,
    pub template: NarrationTemplate,
    /// Raw narration text, footer included, for display and download.
    pub script: String,
    pub source: NarrationSource,
    pub segments: Vec<ScriptSegment>,
}

/// A finished run.
#[derive(Debug, Clone)]
pub struct PodcastOutput {
    pub script: ScriptOutcome,
    pub assembly: PodcastAssembly,
}

/// Orchestrates one or more podcast runs.
pub struct PodcastPipeline {
    config: Config,
    source: Box<dyn RepositorySource>,
    requestor: NarrationRequestor,
    classifier: ComplexityClassifier,
    progress: ProgressReporter,
}

impl PodcastPipeline {
    pub fn new(
        config: Config,
        source: Box<dyn RepositorySource>,
        generator: Box<dyn NarrationGenerator>,
    ) -> Self {
        let requestor = NarrationRequestor::new(generator, config.prompts.clone());
        let classifier = ComplexityClassifier::new(config.complexity.clone());

        Self {
            config,
            source,
            requestor,
            classifier,
            progress: ProgressReporter::default(),
        }
    }

    /// Set a callback for progress events.
    pub fn with_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress = ProgressReporter::new(Some(callback));
        self
    }

    /// Collect, classify and narrate; stops before any audio work.
    pub async fn prepare_script(&mut self, url: &str) -> Result<ScriptOutcome, PipelineError> {
        self.progress.reset();
        self.progress.report(0.0, format!("Fetching {}", url));

        let snapshot = self.source.collect(url).await?;
        self.progress.report(
            0.1,
            format!(
                "Analysing {}/{}",
                snapshot.identity.owner, snapshot.identity.name
            ),
        );

        let metrics = self.measure(&snapshot);
        let summary = repository::summarize(&snapshot);
        let context = repository::build_context(&snapshot, &summary, &self.config.limits);
        self.progress.report(0.6, "Repository analysed");

        let score = self.classifier.score(&metrics);
        let complexity = self.classifier.level_for_score(score);
        let template = NarrationTemplate::for_level(complexity);
        tracing::info!(
            ?metrics,
            score,
            %complexity,
            template = template.display_name(),
            "Repository classified"
        );

        self.progress.report(0.65, "Generating narration script");
        let narration = self
            .requestor
            .request(template, &snapshot.identity, &summary, &context)
            .await;
        self.progress.report(0.8, "Narration script ready");

        let segments = script::segment_script(&narration.text)?;
        self.progress.report(
            0.85,
            format!("Script split into {} segments", segments.len()),
        );

        Ok(ScriptOutcome {
            identity: snapshot.identity,
            metrics,
            score,
            complexity,
            template,
            script: narration.text,
            source: narration.source,
            segments,
        })
    }

    /// Full run: script, then audio.
    pub async fn run(
        &mut self,
        url: &str,
        assembler: &AudioAssembler,
        synthesizer: &mut dyn SpeechSynthesizer,
    ) -> Result<PodcastOutput, PipelineError> {
        let script = self.prepare_script(url).await?;

        let assembly =
            assembler.assemble(&script.segments, synthesizer, &mut self.progress, (0.85, 0.99))?;
        self.progress.report(1.0, "Podcast ready");

        Ok(PodcastOutput { script, assembly })
    }

    /// Metrics for the snapshot, one progress event per file.
    fn measure(&mut self, snapshot: &RepositorySnapshot) -> RepositoryMetrics {
        let total = snapshot.files.len();
        let mut acc = MetricsAccumulator::new();

        for (done, file) in snapshot.files.iter().enumerate() {
            acc.add(file);
            self.progress.report_within(
                0.1,
                0.5,
                done + 1,
                total,
                format!("Analysing: {}", file.path),
            );
        }

        acc.finish(&snapshot.readme)
    }
}

/// File name for a run artifact, e.g. `widgets_podcast.wav`.
pub fn output_filename(repository: &str, suffix: &str) -> String {
    let sanitized: String = repository
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .take(50)
        .collect();

    let stem = sanitized.trim_matches(|c| c == '.' || c == '_');
    let stem = if stem.is_empty() { "repositorio" } else { stem };
    format!("{}_{}", stem, suffix)
}
