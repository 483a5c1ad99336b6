//! Audio source layer.
//!
//! Frame sources capture fixed-size s16le frames on a dedicated thread
//! and hand them to the relay through a bounded channel:
//! - Microphone: live cpal capture, resampled to the relay rate
//! - WAV file: real-time-paced replay of a pre-recorded file

pub mod devices;
pub mod frames;
pub mod microphone;
pub mod wav;

pub use devices::{list_input_devices, mic_check, DeviceInfo, LevelReport};
pub use frames::FrameAssembler;
pub use microphone::MicrophoneSource;
pub use wav::WavFrameSource;
