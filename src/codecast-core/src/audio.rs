//! Mono PCM clips and the signal operations assembly needs.
//!
//! Clips are mono `f32` at a known sample rate. Decoding accepts WAV
//! (through hound) and anything symphonia can probe; encoding always
//! produces 16-bit PCM WAV.

use std::io::Cursor;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// A decoded mono clip.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn silence(duration_ms: u32, sample_rate: u32) -> Self {
        Self::new(vec![0.0; ms_to_samples(duration_ms, sample_rate)], sample_rate)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / self.sample_rate as u64
    }

    /// Convert to `rate` using linear interpolation.
    pub fn resampled(self, rate: u32) -> Self {
        if self.sample_rate == rate || self.samples.is_empty() {
            return Self::new(self.samples, rate);
        }

        let step = self.sample_rate as f64 / rate as f64;
        let new_len = (self.samples.len() as f64 / step) as usize;
        let mut result = Vec::with_capacity(new_len);

        for i in 0..new_len {
            let src_pos = i as f64 * step;
            let src_idx = src_pos as usize;
            let frac = (src_pos - src_idx as f64) as f32;

            if src_idx + 1 < self.samples.len() {
                // Linear interpolation between adjacent samples
                result.push(self.samples[src_idx] * (1.0 - frac) + self.samples[src_idx + 1] * frac);
            } else if src_idx < self.samples.len() {
                result.push(self.samples[src_idx]);
            }
        }

        Self::new(result, rate)
    }

    /// Copy cut to at most `max_ms`, faded out linearly over the last `fade_fraction` of it.
    pub fn trimmed_with_fade(&self, max_ms: u32, fade_fraction: f32) -> Self {
        let keep = ms_to_samples(max_ms, self.sample_rate).min(self.samples.len());
        let mut samples = self.samples[..keep].to_vec();

        let fade_len = ((keep as f32) * fade_fraction.clamp(0.0, 1.0)) as usize;
        if fade_len > 0 {
            let fade_start = keep - fade_len;
            for (i, sample) in samples[fade_start..].iter_mut().enumerate() {
                let gain = 1.0 - (i + 1) as f32 / fade_len as f32;
                *sample *= gain;
            }
        }

        Self::new(samples, self.sample_rate)
    }

    /// Append `other`, which must already be at this clip's rate.
    pub fn append(&mut self, other: &AudioClip) {
        debug_assert_eq!(self.sample_rate, other.sample_rate);
        self.samples.extend_from_slice(&other.samples);
    }

    /// Root-mean-square level of the whole clip.
    pub fn rms(&self) -> f32 {
        rms(&self.samples)
    }

    /// Drop trailing windows quieter than the clip's own RMS minus `offset_db`.
    ///
    /// Only the end of the clip is touched. Returns the number of samples removed.
    pub fn trim_trailing_silence(&mut self, window_ms: u32, offset_db: f32) -> usize {
        let average = self.rms();
        if average <= 0.0 {
            return 0;
        }
        let threshold = average * 10f32.powf(-offset_db / 20.0);
        let window = ms_to_samples(window_ms, self.sample_rate).max(1);

        let mut end = self.samples.len();
        while end > 0 {
            let start = end.saturating_sub(window);
            if rms(&self.samples[start..end]) > threshold {
                break;
            }
            end = start;
        }

        let removed = self.samples.len() - end;
        self.samples.truncate(end);
        removed
    }
}

pub fn ms_to_samples(ms: u32, sample_rate: u32) -> usize {
    (ms as u64 * sample_rate as u64 / 1000) as usize
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|s| (*s as f64) * (*s as f64)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}

/// Combine clips that share one sample rate, in order.
pub fn concatenate(clips: &[AudioClip], sample_rate: u32) -> AudioClip {
    let total = clips.iter().map(AudioClip::len).sum();
    let mut combined = AudioClip::new(Vec::with_capacity(total), sample_rate);
    for clip in clips {
        combined.append(clip);
    }
    combined
}

/// Decode audio bytes into a mono clip.
///
/// `extension` is only a probing hint for non-WAV data.
pub fn decode(bytes: &[u8], extension: Option<&str>) -> Result<AudioClip, String> {
    if bytes.starts_with(b"RIFF") {
        decode_wav(bytes)
    } else {
        decode_probed(bytes.to_vec(), extension)
    }
}

/// Read and decode an audio file.
pub fn decode_file(path: &Path) -> Result<AudioClip, String> {
    let bytes = std::fs::read(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    decode(&bytes, path.extension().and_then(|e| e.to_str()))
}

fn decode_wav(bytes: &[u8]) -> Result<AudioClip, String> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| format!("Invalid WAV data: {}", e))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| format!("Failed to read WAV samples: {}", e))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| format!("Failed to read WAV samples: {}", e))?
        }
    };

    Ok(AudioClip::new(
        downmix(&interleaved, spec.channels as usize),
        spec.sample_rate,
    ))
}

fn decode_probed(bytes: Vec<u8>, extension: Option<&str>) -> Result<AudioClip, String> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| format!("Failed to probe audio format: {}", e))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| "No audio tracks found".to_string())?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| "Sample rate not specified in codec params".to_string())?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| format!("Failed to create decoder: {}", e))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(format!("Failed to read packet: {}", e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Corrupt frame: skip it like a player would.
            Err(SymphoniaError::DecodeError(msg)) => {
                tracing::debug!(msg, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(format!("Failed to decode packet: {}", e)),
        };

        let spec = *decoded.spec();
        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend(downmix(buffer.samples(), spec.channels.count()));
    }

    if samples.is_empty() {
        return Err("Decoded stream contains no samples".to_string());
    }
    Ok(AudioClip::new(samples, sample_rate))
}

/// Average interleaved channels into one.
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Encode a clip as 16-bit PCM WAV bytes.
pub fn encode_wav(clip: &AudioClip) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: clip.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in &clip.samples {
            let clamped = sample.clamp(-1.0, 1.0);
            writer.write_sample((clamped * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_duration() {
        let clip = AudioClip::silence(500, 24_000);
        assert_eq!(clip.len(), 12_000);
        assert_eq!(clip.duration_ms(), 500);
        assert_eq!(clip.rms(), 0.0);
    }

    #[test]
    fn test_resample_halves_length() {
        let clip = AudioClip::new(vec![0.5; 48_000], 48_000);
        let resampled = clip.resampled(24_000);
        assert_eq!(resampled.sample_rate, 24_000);
        assert_eq!(resampled.len(), 24_000);
        assert_eq!(resampled.duration_ms(), 1_000);
    }

    #[test]
    fn test_resample_interpolates() {
        let clip = AudioClip::new(vec![0.0, 1.0], 10);
        let resampled = clip.resampled(20);
        assert_eq!(resampled.samples, vec![0.0, 0.5, 1.0, 1.0]);
    }

    #[test]
    fn test_trim_with_fade() {
        let clip = AudioClip::new(vec![1.0; 2_000], 1_000);
        let cue = clip.trimmed_with_fade(1_000, 0.5);

        assert_eq!(cue.len(), 1_000);
        assert_eq!(cue.samples[0], 1.0);
        assert_eq!(cue.samples[499], 1.0);
        assert!(cue.samples[500] < 1.0);
        assert!(cue.samples[750] < cue.samples[600]);
        assert_eq!(cue.samples[999], 0.0);
        // The source clip is left untouched.
        assert!(clip.samples.iter().all(|s| *s == 1.0));
    }

    #[test]
    fn test_trim_shorter_clip_keeps_length() {
        let clip = AudioClip::new(vec![1.0; 300], 1_000);
        let cue = clip.trimmed_with_fade(1_000, 0.0);
        assert_eq!(cue, clip);
    }

    #[test]
    fn test_trailing_silence_trimmed_only_at_end() {
        let mut clip = AudioClip::new(vec![0.5; 2_400], 24_000);
        clip.append(&AudioClip::silence(500, 24_000));
        clip.append(&AudioClip::new(vec![0.5; 2_400], 24_000));
        clip.append(&AudioClip::silence(500, 24_000));

        let removed = clip.trim_trailing_silence(10, 16.0);
        assert_eq!(removed, 12_000);
        assert_eq!(clip.len(), 2_400 + 12_000 + 2_400);
    }

    #[test]
    fn test_trailing_silence_all_silent_untouched() {
        let mut clip = AudioClip::silence(100, 24_000);
        assert_eq!(clip.trim_trailing_silence(10, 16.0), 0);
        assert_eq!(clip.len(), 2_400);
    }

    #[test]
    fn test_concatenate_preserves_order() {
        let a = AudioClip::new(vec![0.1, 0.2], 8);
        let b = AudioClip::new(vec![0.3], 8);
        let combined = concatenate(&[a, b], 8);
        assert_eq!(combined.samples, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_wav_encode_decode() {
        let clip = AudioClip::new(vec![0.0, 0.5, -0.5, 0.25], 16_000);
        let bytes = encode_wav(&clip).unwrap();
        assert!(bytes.starts_with(b"RIFF"));

        let decoded = decode(&bytes, None).unwrap();
        assert_eq!(decoded.sample_rate, 16_000);
        assert_eq!(decoded.len(), 4);
        for (a, b) in decoded.samples.iter().zip(&clip.samples) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn test_stereo_wav_downmixed() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for _ in 0..10 {
                writer.write_sample(16_384i16).unwrap();
                writer.write_sample(0i16).unwrap();
            }
            writer.finalize().unwrap();
        }

        let decoded = decode(&cursor.into_inner(), Some("wav")).unwrap();
        assert_eq!(decoded.len(), 10);
        assert!((decoded.samples[0] - 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_garbage_fails_to_decode() {
        assert!(decode(b"definitely not audio", Some("mp3")).is_err());
    }

    #[test]
    fn test_decode_missing_file() {
        assert!(decode_file(Path::new("/nonexistent/cue.mp3")).is_err());
    }
}
