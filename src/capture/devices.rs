//! Input device inspection helpers for the `devices` and `mic-check`
//! console commands.

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::capture::frames::mix_to_mono;
use crate::capture::microphone::map_device_error;
use crate::error::RelayError;

/// Summary of one audio input device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub channels: u16,
    pub default_sample_rate: u32,
}

/// List input devices with their default configurations.
pub fn list_input_devices() -> Result<Vec<DeviceInfo>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| map_device_error(&e))
        .context("Failed to enumerate input devices")?;

    let mut out = Vec::new();
    for device in devices {
        let name = device.name().unwrap_or_else(|_| "<unknown>".to_string());
        // Skip devices that refuse to report a config rather than failing
        // the whole listing.
        if let Ok(config) = device.default_input_config() {
            out.push(DeviceInfo {
                name,
                channels: config.channels(),
                default_sample_rate: config.sample_rate().0,
            });
        }
    }
    Ok(out)
}

/// Measured input levels from a short capture.
#[derive(Debug, Clone, Copy)]
pub struct LevelReport {
    pub peak: f32,
    pub rms: f32,
    pub samples: usize,
}

impl LevelReport {
    /// A level that suggests the microphone actually picked something up.
    pub fn looks_live(&self) -> bool {
        self.samples > 0 && self.peak > 0.001
    }
}

/// Record from the default input device for `duration` and report peak
/// and RMS levels, so the user can verify the microphone before
/// streaming.
pub fn mic_check(duration: Duration) -> Result<LevelReport> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(RelayError::DeviceUnavailable)?;
    let config = device
        .default_input_config()
        .map_err(|e| map_device_error(&e))
        .context("Failed to query input device configuration")?;
    let channels = config.channels() as usize;

    let captured: Arc<Mutex<Vec<f32>>> = Arc::new(Mutex::new(Vec::new()));
    let captured_for_cb = captured.clone();

    let stream = device
        .build_input_stream(
            &config.into(),
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                captured_for_cb.lock().extend(mix_to_mono(data, channels));
            },
            |err| tracing::error!("mic check stream error: {}", err),
            None,
        )
        .map_err(|e| map_device_error(&e))
        .context("Failed to open capture stream")?;

    stream.play().context("Failed to start capture stream")?;
    thread::sleep(duration);
    drop(stream);

    let samples = captured.lock().clone();
    Ok(measure_levels(&samples))
}

fn measure_levels(samples: &[f32]) -> LevelReport {
    if samples.is_empty() {
        return LevelReport {
            peak: 0.0,
            rms: 0.0,
            samples: 0,
        };
    }
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    let rms = (sum_squares / samples.len() as f32).sqrt();
    LevelReport {
        peak,
        rms,
        samples: samples.len(),
    }
}
