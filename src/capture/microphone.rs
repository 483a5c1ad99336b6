//! Microphone frame source built on cpal.
//!
//! The device runs at its native rate; samples are mixed down to mono,
//! resampled to the configured relay rate with a sinc resampler, and
//! packed into fixed-size frames.
//!
//! Overrun policy: when the relay cannot keep up and the bounded frame
//! channel is full, the frame is dropped with a logged warning and
//! counted — never silently. Frames that do reach the channel keep
//! their capture order.

use anyhow::{anyhow, Context, Result};
use async_channel::Sender;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::capture::frames::{mix_to_mono, FrameAssembler};
use crate::domain::traits::FrameSource;
use crate::domain::types::AudioFrame;
use crate::error::RelayError;

/// Classify a cpal error as a permission problem or leave it generic.
pub(crate) fn map_device_error(err: &dyn std::fmt::Display) -> RelayError {
    let text = err.to_string();
    let lower = text.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not allowed") {
        RelayError::DevicePermissionDenied(text)
    } else {
        RelayError::TransportError(text)
    }
}

pub struct MicrophoneSource {
    target_rate: u32,
    frame_size_bytes: usize,
    is_capturing: Arc<AtomicBool>,
    dropped_frames: Arc<AtomicU64>,
    failure: Arc<Mutex<Option<RelayError>>>,
}

impl MicrophoneSource {
    pub fn new(target_rate: u32, frame_size_bytes: usize) -> Self {
        Self {
            target_rate,
            frame_size_bytes,
            is_capturing: Arc::new(AtomicBool::new(false)),
            dropped_frames: Arc::new(AtomicU64::new(0)),
            failure: Arc::new(Mutex::new(None)),
        }
    }

    /// Frames dropped so far because the relay fell behind.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }
}

struct CaptureState {
    resampler: Option<SincFixedIn<f32>>,
    pending: Vec<f32>,
    assembler: FrameAssembler,
}

impl FrameSource for MicrophoneSource {
    fn start(&self, frames: Sender<AudioFrame>) -> Result<()> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(RelayError::DeviceUnavailable)?;

        let config = device
            .default_input_config()
            .map_err(|e| map_device_error(&e))
            .context("Failed to query input device configuration")?;
        let device_rate = config.sample_rate().0;
        let channels = config.channels() as usize;

        debug!(
            device_rate,
            channels,
            target_rate = self.target_rate,
            "opening microphone"
        );

        self.is_capturing.store(true, Ordering::SeqCst);
        self.dropped_frames.store(0, Ordering::Relaxed);
        *self.failure.lock() = None;

        // Resampler only needed when the device rate differs from the
        // relay rate.
        let resampler = if device_rate != self.target_rate {
            let params = SincInterpolationParameters {
                sinc_len: 256,
                f_cutoff: 0.95,
                interpolation: SincInterpolationType::Linear,
                oversampling_factor: 256,
                window: WindowFunction::BlackmanHarris2,
            };
            let ratio = self.target_rate as f64 / device_rate as f64;
            Some(
                SincFixedIn::<f32>::new(ratio, 2.0, params, 1024, 1)
                    .map_err(|e| anyhow!("Failed to create resampler: {}", e))?,
            )
        } else {
            None
        };

        let state = Arc::new(Mutex::new(CaptureState {
            resampler,
            pending: Vec::new(),
            assembler: FrameAssembler::new(self.frame_size_bytes),
        }));

        let is_capturing = self.is_capturing.clone();
        let is_capturing_for_loop = self.is_capturing.clone();
        let dropped = self.dropped_frames.clone();
        let failure = self.failure.clone();

        thread::spawn(move || {
            let frames_for_cb = frames.clone();
            let state_for_cb = state.clone();
            let capturing_for_cb = is_capturing.clone();
            let dropped_for_cb = dropped.clone();

            let stream = device.build_input_stream(
                &config.into(),
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if !capturing_for_cb.load(Ordering::SeqCst) {
                        return;
                    }

                    let mono = mix_to_mono(data, channels);
                    let mut state = state_for_cb.lock();
                    let ready = resample_into_pending(&mut state, &mono);
                    for frame in state.assembler.push_samples(&ready) {
                        forward_frame(&frames_for_cb, frame, &dropped_for_cb);
                    }
                },
                |err| error!("capture stream error: {}", err),
                None,
            );

            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    abort_capture(map_device_error(&e), &failure, &is_capturing, &frames);
                    return;
                }
            };

            if let Err(e) = stream.play() {
                abort_capture(map_device_error(&e), &failure, &is_capturing, &frames);
                return;
            }

            while is_capturing_for_loop.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(100));
            }

            // Emit the trailing partial frame before releasing the device.
            drop(stream);
            if let Some(frame) = state.lock().assembler.flush() {
                forward_frame(&frames, frame, &dropped);
            }
            let total_dropped = dropped.load(Ordering::Relaxed);
            if total_dropped > 0 {
                warn!(total_dropped, "capture finished with dropped frames");
            }
            frames.close();
        });

        Ok(())
    }

    fn stop(&self) {
        self.is_capturing.store(false, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.is_capturing.load(Ordering::SeqCst)
    }

    fn take_error(&self) -> Option<RelayError> {
        self.failure.lock().take()
    }
}

/// Shut the capture pipeline down on a fatal error. The relay only
/// sees the closed channel; the reason is recorded for the caller to
/// collect through `FrameSource::take_error`.
fn abort_capture(
    err: RelayError,
    failure: &Mutex<Option<RelayError>>,
    is_capturing: &AtomicBool,
    frames: &Sender<AudioFrame>,
) {
    error!("capture failed: {}", err);
    *failure.lock() = Some(err);
    is_capturing.store(false, Ordering::SeqCst);
    frames.close();
}

/// Run mono samples through the optional resampler, returning samples at
/// the relay rate. Keeps a carry buffer so the resampler always sees its
/// expected chunk size.
fn resample_into_pending(state: &mut CaptureState, mono: &[f32]) -> Vec<f32> {
    let Some(resampler) = state.resampler.as_mut() else {
        return mono.to_vec();
    };

    state.pending.extend_from_slice(mono);
    let chunk = resampler.input_frames_next();
    let mut out = Vec::new();
    let mut pos = 0;
    while state.pending.len() - pos >= chunk {
        let input = vec![state.pending[pos..pos + chunk].to_vec()];
        match resampler.process(&input, None) {
            Ok(output) => out.extend_from_slice(&output[0]),
            Err(e) => {
                error!("resampling failed: {}", e);
                break;
            }
        }
        pos += chunk;
    }
    state.pending.drain(..pos);
    out
}

fn forward_frame(frames: &Sender<AudioFrame>, frame: AudioFrame, dropped: &Arc<AtomicU64>) {
    if let Err(async_channel::TrySendError::Full(frame)) = frames.try_send(frame) {
        let count = dropped.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(seq = frame.seq, total_dropped = count, "relay behind capture, dropping frame");
    }
}
