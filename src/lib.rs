//! Console client that relays audio to a cloud speech-to-text service.
//!
//! Two paths to a transcript:
//! - Streaming: capture microphone (or WAV file) audio, forward it over
//!   a WebSocket session, and print partial and final results live.
//! - Batch: submit a remotely-stored file over HTTP and poll the job
//!   until it completes.

pub mod app;
pub mod batch;
pub mod capture;
pub mod cli;
pub mod domain;
pub mod error;
pub mod menu;
pub mod relay;
pub mod report;

#[cfg(test)]
pub mod test_support;
