//! TTS module for text-to-speech synthesis using kokoro-tiny.

use kokoro_tiny::TtsEngine;

#[cfg(test)]
use mockall::automock;

use crate::audio::{self, AudioClip};
use crate::config::SpeechConfig;
use crate::error::{PipelineError, SynthesisFailure};

/// Sample rate of kokoro output.
pub const KOKORO_SAMPLE_RATE: u32 = 24_000;

/// Speech-synthesis collaborator: plain text in, decodable audio bytes out.
#[cfg_attr(test, automock)]
pub trait SpeechSynthesizer {
    fn synthesize(&mut self, text: &str) -> Result<Vec<u8>, SynthesisFailure>;
}

/// Local synthesizer backed by the kokoro model.
pub struct KokoroSynthesizer {
    engine: TtsEngine,
    config: SpeechConfig,
    available_voices: Vec<String>,
}

impl KokoroSynthesizer {
    /// Initialize the TTS engine (downloads model on first run).
    pub async fn new(config: SpeechConfig) -> Result<Self, PipelineError> {
        let engine = TtsEngine::new()
            .await
            .map_err(|e| PipelineError::Tts(format!("Failed to initialize TTS: {}", e)))?;

        let available_voices = engine.voices();

        let synthesizer = Self {
            engine,
            config,
            available_voices,
        };
        synthesizer.validate_voice(&synthesizer.config.voice)?;
        Ok(synthesizer)
    }

    /// Get list of available voice IDs.
    pub fn available_voices(&self) -> &[String] {
        &self.available_voices
    }

    /// Validate that a voice ID exists.
    pub fn validate_voice(&self, voice_id: &str) -> Result<(), PipelineError> {
        if voice_id.is_empty() {
            return Err(PipelineError::Tts(format!(
                "Voice ID cannot be empty. Available voices:\n{}",
                self.format_available_voices()
            )));
        }

        if !self.available_voices.iter().any(|v| v == voice_id) {
            return Err(PipelineError::Tts(format!(
                "Unknown voice '{}'. Available voices:\n{}",
                voice_id,
                self.format_available_voices()
            )));
        }

        Ok(())
    }

    fn format_available_voices(&self) -> String {
        let mut voices: Vec<&String> = self.available_voices.iter().collect();
        voices.sort();

        voices
            .iter()
            .map(|v| format!("  - {}", v))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Synthesize text in chunks, since kokoro has a strict input length limit.
    fn synthesize_samples(&mut self, text: &str) -> Result<Vec<f32>, SynthesisFailure> {
        let pause = audio::ms_to_samples(self.config.chunk_pause_ms, KOKORO_SAMPLE_RATE);
        let mut all_samples = Vec::new();

        for chunk in split_into_chunks(text, self.config.max_chunk_chars) {
            if !all_samples.is_empty() {
                all_samples.extend(std::iter::repeat_n(0.0, pause));
            }

            let samples = self
                .engine
                .synthesize(&chunk, Some(self.config.voice.as_str()))
                .map_err(|e| SynthesisFailure::Engine(format!("Synthesis failed: {}", e)))?;
            all_samples.extend(samples);
        }

        Ok(all_samples)
    }
}

impl SpeechSynthesizer for KokoroSynthesizer {
    fn synthesize(&mut self, text: &str) -> Result<Vec<u8>, SynthesisFailure> {
        let samples = self.synthesize_samples(text)?;
        if samples.is_empty() {
            return Err(SynthesisFailure::Engine(
                "Engine returned no audio".to_string(),
            ));
        }

        audio::encode_wav(&AudioClip::new(samples, KOKORO_SAMPLE_RATE))
            .map_err(|e| SynthesisFailure::Engine(format!("Failed to encode WAV: {}", e)))
    }
}

/// Split text into chunks that are safe for TTS synthesis.
fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current_chunk = String::new();

    // Split by sentence-ending punctuation
    for sentence in text.split_inclusive(&['.', '!', '?', ';'][..]) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        if current_chunk.len() + sentence.len() > max_chars {
            if !current_chunk.is_empty() {
                chunks.push(current_chunk.trim().to_string());
                current_chunk = String::new();
            }

            // If single sentence is too long, split by commas
            if sentence.len() > max_chars {
                for part in sentence.split_inclusive(',') {
                    if current_chunk.len() + part.len() > max_chars && !current_chunk.is_empty() {
                        chunks.push(current_chunk.trim().to_string());
                        current_chunk = String::new();
                    }
                    current_chunk.push_str(part.trim());
                    current_chunk.push(' ');
                }
            } else {
                current_chunk.push_str(sentence);
                current_chunk.push(' ');
            }
        } else {
            current_chunk.push_str(sentence);
            current_chunk.push(' ');
        }
    }

    if !current_chunk.trim().is_empty() {
        chunks.push(current_chunk.trim().to_string());
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_into_chunks() {
        let text = "Hello world. This is a test. Another sentence here.";
        let chunks = split_into_chunks(text, 30);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.len() <= 35);
        }
        assert_eq!(chunks.join(" "), text);
    }

    #[test]
    fn test_split_long_sentence_on_commas() {
        let text = "um dois três, quatro cinco seis, sete oito nove, dez onze doze";
        let chunks = split_into_chunks(text, 30);
        assert!(chunks.len() >= 2);
        assert_eq!(chunks.join(" "), text);
    }

    #[test]
    fn test_short_text_single_chunk() {
        assert_eq!(split_into_chunks("Olá mundo!", 200), vec!["Olá mundo!"]);
        assert!(split_into_chunks("   ", 200).is_empty());
    }
}
