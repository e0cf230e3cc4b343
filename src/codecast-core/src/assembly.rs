//! Audio assembly: segments in, one podcast track out.
//!
//! Cues get the shared vignette, narration segments are synthesized one by
//! one. A segment that fails to synthesize or decode is logged and skipped;
//! the run only fails when nothing at all was produced.

use std::path::Path;

use crate::audio::{self, AudioClip};
use crate::config::AudioConfig;
use crate::error::{AssemblyFailure, SynthesisFailure};
use crate::progress::ProgressReporter;
use crate::script::{ScriptSegment, SegmentKind};
use crate::tts::SpeechSynthesizer;

/// The vignette as inserted at every cue: trimmed and faded once, reused as is.
#[derive(Debug, Clone)]
pub struct CueClip {
    clip: AudioClip,
}

impl CueClip {
    /// Prepare a decoded clip for insertion.
    pub fn prepare(source: AudioClip, config: &AudioConfig) -> Self {
        let clip = source
            .resampled(config.sample_rate)
            .trimmed_with_fade(config.cue_max_ms, config.cue_fade_fraction);
        Self { clip }
    }

    /// Load and prepare the cue file; `None` disables cues for the run.
    pub fn load(path: &Path, config: &AudioConfig) -> Option<Self> {
        match audio::decode_file(path) {
            Ok(clip) => {
                let cue = Self::prepare(clip, config);
                tracing::info!(path = %path.display(), duration_ms = cue.clip.duration_ms(), "Cue clip loaded");
                Some(cue)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cue clip unavailable, cues disabled");
                None
            }
        }
    }

    pub fn clip(&self) -> &AudioClip {
        &self.clip
    }
}

/// The finished track.
#[derive(Debug, Clone)]
pub struct PodcastAssembly {
    /// Final mono track after trailing-silence trimming.
    pub audio: AudioClip,
    /// `audio` encoded as WAV.
    pub encoded: Vec<u8>,
    pub narration_segments: usize,
    pub skipped_segments: usize,
    pub cues_inserted: usize,
    pub trimmed_ms: u64,
}

impl PodcastAssembly {
    pub fn duration_ms(&self) -> u64 {
        self.audio.duration_ms()
    }
}

/// Turns a segment list into a podcast track.
pub struct AudioAssembler {
    config: AudioConfig,
    cue: Option<CueClip>,
}

impl AudioAssembler {
    pub fn new(config: AudioConfig, cue: Option<CueClip>) -> Self {
        Self { config, cue }
    }

    /// Build an assembler, loading the cue file named in the config.
    pub fn from_config(config: AudioConfig) -> Self {
        let cue = config
            .cue_path
            .as_deref()
            .and_then(|path| CueClip::load(path, &config));
        Self::new(config, cue)
    }

    pub fn has_cue(&self) -> bool {
        self.cue.is_some()
    }

    /// Assemble `segments` in order.
    ///
    /// Progress is reported per segment within `[start, end]`.
    pub fn assemble(
        &self,
        segments: &[ScriptSegment],
        synthesizer: &mut dyn SpeechSynthesizer,
        progress: &mut ProgressReporter,
        (start, end): (f32, f32),
    ) -> Result<PodcastAssembly, AssemblyFailure> {
        let rate = self.config.sample_rate;
        let gap = AudioClip::silence(self.config.gap_ms, rate);

        let mut clips: Vec<AudioClip> = Vec::new();
        let mut narration_segments = 0;
        let mut skipped_segments = 0;
        let mut cues_inserted = 0;

        for (done, segment) in segments.iter().enumerate() {
            match &segment.kind {
                SegmentKind::Cue(kind) => match &self.cue {
                    Some(cue) => {
                        tracing::debug!(order = segment.order, cue = ?kind, "Inserting cue");
                        clips.push(cue.clip().clone());
                        cues_inserted += 1;
                    }
                    None => {
                        tracing::debug!(order = segment.order, cue = ?kind, "No cue clip loaded, skipping cue");
                    }
                },
                SegmentKind::Narration { text } => match self.synthesize(synthesizer, text) {
                    Ok(clip) => {
                        tracing::debug!(order = segment.order, duration_ms = clip.duration_ms(), "Narration synthesized");
                        clips.push(clip);
                        clips.push(gap.clone());
                        narration_segments += 1;
                    }
                    Err(e) => {
                        tracing::warn!(order = segment.order, error = %e, "Skipping narration segment");
                        skipped_segments += 1;
                    }
                },
            }

            progress.report_within(
                start,
                end,
                done + 1,
                segments.len(),
                format!("Audio segment {} of {}", done + 1, segments.len()),
            );
        }

        if clips.is_empty() {
            return Err(AssemblyFailure::NoAudioProduced);
        }

        let mut track = audio::concatenate(&clips, rate);
        let removed = track.trim_trailing_silence(
            self.config.silence_window_ms,
            self.config.silence_offset_db,
        );
        let encoded =
            audio::encode_wav(&track).map_err(|e| AssemblyFailure::Encode(e.to_string()))?;

        tracing::info!(
            duration_ms = track.duration_ms(),
            narration_segments,
            skipped_segments,
            cues_inserted,
            "Podcast assembled"
        );

        Ok(PodcastAssembly {
            trimmed_ms: (removed as u64 * 1000) / rate as u64,
            audio: track,
            encoded,
            narration_segments,
            skipped_segments,
            cues_inserted,
        })
    }

    fn synthesize(
        &self,
        synthesizer: &mut dyn SpeechSynthesizer,
        text: &str,
    ) -> Result<AudioClip, SynthesisFailure> {
        let bytes = synthesizer.synthesize(text)?;
        let clip = audio::decode(&bytes, None).map_err(SynthesisFailure::Decode)?;
        if clip.is_empty() {
            return Err(SynthesisFailure::Decode("Synthesized clip is empty".to_string()));
        }
        Ok(clip.resampled(self.config.sample_rate))
    }
}
