//! WAV file frame source.
//!
//! Streams a pre-recorded file through the same relay path as the
//! microphone: read, mix to mono, resample to the relay rate, pack into
//! fixed-size frames. Frames are paced at real time so the remote
//! endpoint sees a live-like stream, and the channel send blocks rather
//! than drops — a file source has no capture deadline to miss.

use anyhow::{Context, Result};
use async_channel::Sender;
use rubato::{FftFixedIn, Resampler};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::debug;

use crate::capture::frames::{mix_to_mono, FrameAssembler};
use crate::domain::traits::FrameSource;
use crate::domain::types::AudioFrame;

/// Audio data read from a WAV file.
#[derive(Debug)]
pub struct WavAudio {
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_secs: f64,
    /// Interleaved samples for multi-channel files.
    pub samples: Vec<f32>,
}

/// Read a WAV file and convert to f32 samples.
///
/// Supports 8/16/24/32-bit integer and 32-bit float formats.
pub fn read_wav(path: &Path) -> Result<WavAudio> {
    let reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;

    let spec = reader.spec();
    let sample_rate = spec.sample_rate;
    let channels = spec.channels;
    let bits_per_sample = spec.bits_per_sample;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max_value = (1i64 << (bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_value))
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read WAV samples")?
        }
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read WAV samples")?,
    };

    let total_samples = samples.len() / channels as usize;
    let duration_secs = total_samples as f64 / sample_rate as f64;

    Ok(WavAudio {
        sample_rate,
        channels,
        duration_secs,
        samples,
    })
}

/// Resample mono audio to the target rate using rubato.
pub fn resample(samples: &[f32], input_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    if input_rate == target_rate {
        return Ok(samples.to_vec());
    }

    let mut resampler = FftFixedIn::<f32>::new(
        input_rate as usize,
        target_rate as usize,
        1024, // chunk size
        2,    // sub chunks
        1,    // channels
    )
    .context("Failed to create resampler")?;

    let mut output = Vec::new();
    let mut input_pos = 0;

    let frames_needed = resampler.input_frames_next();
    while input_pos + frames_needed <= samples.len() {
        let input_chunk = vec![samples[input_pos..input_pos + frames_needed].to_vec()];
        let resampled = resampler
            .process(&input_chunk, None)
            .context("Resampling failed")?;
        output.extend_from_slice(&resampled[0]);
        input_pos += frames_needed;
    }

    // Process remaining samples with padding
    if input_pos < samples.len() {
        let remaining = &samples[input_pos..];
        let mut padded = remaining.to_vec();
        padded.resize(frames_needed, 0.0);
        let resampled = resampler
            .process(&[padded], None)
            .context("Resampling final chunk failed")?;

        let remaining_duration = remaining.len() as f64 / input_rate as f64;
        let expected_output = (remaining_duration * target_rate as f64).ceil() as usize;
        output.extend_from_slice(&resampled[0][..expected_output.min(resampled[0].len())]);
    }

    Ok(output)
}

/// Frame source that replays a WAV file at real-time pace.
pub struct WavFrameSource {
    path: PathBuf,
    target_rate: u32,
    frame_size_bytes: usize,
    is_active: Arc<AtomicBool>,
    /// Skip the per-frame sleep; used by tests and batch-like replays.
    realtime_pacing: bool,
}

impl WavFrameSource {
    pub fn new(path: PathBuf, target_rate: u32, frame_size_bytes: usize) -> Self {
        Self {
            path,
            target_rate,
            frame_size_bytes,
            is_active: Arc::new(AtomicBool::new(false)),
            realtime_pacing: true,
        }
    }

    pub fn without_pacing(mut self) -> Self {
        self.realtime_pacing = false;
        self
    }
}

impl FrameSource for WavFrameSource {
    fn start(&self, frames: Sender<AudioFrame>) -> Result<()> {
        let audio = read_wav(&self.path)?;
        debug!(
            rate = audio.sample_rate,
            channels = audio.channels,
            duration_secs = audio.duration_secs,
            "streaming WAV file"
        );

        let mono = mix_to_mono(&audio.samples, audio.channels as usize);
        let samples = resample(&mono, audio.sample_rate, self.target_rate)?;

        let frame_size = self.frame_size_bytes;
        let samples_per_frame = frame_size / 2;
        let frame_duration =
            Duration::from_secs_f64(samples_per_frame as f64 / self.target_rate as f64);
        let pace = self.realtime_pacing;
        let is_active = self.is_active.clone();
        is_active.store(true, Ordering::SeqCst);

        thread::spawn(move || {
            let mut assembler = FrameAssembler::new(frame_size);
            let mut ready = assembler.push_samples(&samples);
            if let Some(tail) = assembler.flush() {
                ready.push(tail);
            }

            for frame in ready {
                if !is_active.load(Ordering::SeqCst) {
                    break;
                }
                // Blocking send: backpressure instead of dropping.
                if frames.send_blocking(frame).is_err() {
                    break;
                }
                if pace {
                    thread::sleep(frame_duration);
                }
            }

            is_active.store(false, Ordering::SeqCst);
            frames.close();
        });

        Ok(())
    }

    fn stop(&self) {
        self.is_active.store(false, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};

    fn write_test_wav(path: &Path, rate: u32, samples: &[i16]) {
        let spec = WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_read_wav_int16() {
        let dir = std::env::temp_dir().join("relay_wav_read_test");
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("tone.wav");
        write_test_wav(&path, 16000, &[0, i16::MAX / 2, i16::MIN / 2]);

        let audio = read_wav(&path).unwrap();
        assert_eq!(audio.sample_rate, 16000);
        assert_eq!(audio.channels, 1);
        assert_eq!(audio.samples.len(), 3);
        assert!(audio.samples[0].abs() < 1e-6);
        assert!((audio.samples[1] - 0.5).abs() < 0.01);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_read_wav_missing_file() {
        let err = read_wav(Path::new("/nonexistent/missing.wav")).unwrap_err();
        assert!(err.to_string().contains("missing.wav"));
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&samples, 16000, 16000).unwrap(), samples);
    }

    #[test]
    fn test_resample_halves_length() {
        let samples = vec![0.0f32; 32000];
        let out = resample(&samples, 32000, 16000).unwrap();
        // One second of audio in, roughly one second out
        assert!((out.len() as i64 - 16000).unsigned_abs() < 200);
    }

    #[test]
    fn test_wav_source_streams_all_frames_in_order() {
        let dir = std::env::temp_dir().join("relay_wav_source_test");
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("stream.wav");
        // 2.5 frames worth of audio at 4 samples per frame
        write_test_wav(&path, 16000, &[100i16; 10]);

        let source = WavFrameSource::new(path.clone(), 16000, 8).without_pacing();
        let (tx, rx) = async_channel::bounded(16);
        source.start(tx).unwrap();

        let mut frames = Vec::new();
        while let Ok(frame) = rx.recv_blocking() {
            frames.push(frame);
        }

        // Two full frames plus a padded tail
        assert_eq!(frames.len(), 3);
        assert_eq!(
            frames.iter().map(|f| f.seq).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert!(frames.iter().all(|f| f.data.len() == 8));

        let _ = std::fs::remove_file(&path);
    }
}
