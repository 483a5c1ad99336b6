//! Console command handlers.

pub mod args;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use anyhow::{Context, Result};
use async_channel::Sender;
use parking_lot::Mutex;
use tracing::warn;

use crate::app::config::Config;
use crate::batch::{wait_for_completion, BatchClient, SubmitRequest};
use crate::capture::{list_input_devices, mic_check, MicrophoneSource, WavFrameSource};
use crate::domain::traits::FrameSource;
use crate::domain::types::SessionState;
use crate::error::RelayError;
use crate::relay::protocol::StartRequest;
use crate::relay::{
    connect_with_timeout, SessionMonitor, SessionOutcome, SessionTimeouts, StopSignal,
    StreamSession, WsConnection,
};
use crate::report::ConsoleReporter;

pub use args::{BatchArgs, Cli, Commands, MicCheckArgs, StreamArgs};

struct StopDispatch {
    tx: Sender<StopSignal>,
    presses: AtomicUsize,
}

impl StopDispatch {
    /// First press asks for a graceful stop, every later press forces.
    fn signal(&self) -> StopSignal {
        if self.presses.fetch_add(1, Ordering::SeqCst) == 0 {
            StopSignal::Graceful
        } else {
            StopSignal::Forced
        }
    }
}

static ACTIVE_STOP: Mutex<Option<Arc<StopDispatch>>> = Mutex::new(None);
static STOP_HANDLER: Once = Once::new();

/// Uninstalls the session's stop channel on drop, so interrupts
/// outside a streaming session fall back to terminating the process.
struct StopGuard;

impl Drop for StopGuard {
    fn drop(&mut self) {
        *ACTIVE_STOP.lock() = None;
    }
}

/// Route Ctrl+C to the current session. The process-wide handler is
/// registered once; each session swaps in its own stop channel for the
/// time the returned guard is alive. With no session active, Ctrl+C
/// exits the process (the menu and batch polling stay interruptible).
fn install_stop_handler(tx: Sender<StopSignal>) -> Result<StopGuard> {
    *ACTIVE_STOP.lock() = Some(Arc::new(StopDispatch {
        tx,
        presses: AtomicUsize::new(0),
    }));

    let mut registration = Ok(());
    STOP_HANDLER.call_once(|| {
        registration = ctrlc::set_handler(|| {
            let dispatch = ACTIVE_STOP.lock().clone();
            match dispatch {
                Some(dispatch) => {
                    let signal = dispatch.signal();
                    if signal == StopSignal::Graceful {
                        eprintln!("\nStopping... press Ctrl+C again to force close.");
                    }
                    let _ = dispatch.tx.try_send(signal);
                }
                None => std::process::exit(130),
            }
        })
        .context("Failed to register Ctrl+C handler");
    });
    registration.map(|_| StopGuard)
}

fn apply_stream_overrides(config: &Config, args: &StreamArgs) -> Config {
    let mut config = config.clone();
    if let Some(language) = &args.language {
        config.language = language.clone();
    }
    if let Some(region) = &args.region {
        config.region = region.clone();
    }
    if let Some(endpoint) = &args.endpoint {
        config.streaming_endpoint = Some(endpoint.clone());
    }
    config
}

/// Run one live streaming session end to end.
pub async fn handle_stream(config: &Config, args: &StreamArgs) -> Result<()> {
    let config = apply_stream_overrides(config, args);
    let url = config.streaming_url()?;
    let auth = config.resolve_auth_token();
    if auth.is_none() {
        warn!(
            env = %config.auth_token_env,
            "no auth token found in environment, connecting anonymously"
        );
    }

    let source: Box<dyn FrameSource> = match &args.input {
        Some(path) => Box::new(WavFrameSource::new(
            path.clone(),
            config.sample_rate_hz,
            config.frame_size_bytes,
        )),
        None => Box::new(MicrophoneSource::new(
            config.sample_rate_hz,
            config.frame_size_bytes,
        )),
    };

    // Bounded so a stalled transport surfaces as dropped mic frames
    // instead of unbounded memory growth.
    let (frame_tx, frame_rx) = async_channel::bounded(64);
    let (stop_tx, stop_rx) = async_channel::bounded(2);
    let _stop_guard = install_stop_handler(stop_tx)?;

    let monitor = SessionMonitor::new();
    let timeouts = SessionTimeouts::new(config.connect_timeout_secs, config.drain_timeout_secs);
    let start = StartRequest::pcm_s16le(
        config.sample_rate_hz,
        config.channels,
        &config.language,
        &config.region,
    );

    monitor.transition(SessionState::Connecting);
    println!("Connecting to {}...", url);
    let conn = connect_with_timeout(
        timeouts.connect,
        WsConnection::connect(&url, &start, auth.as_deref()),
    )
    .await
    .map_err(|e| {
        monitor.transition(SessionState::Failed);
        anyhow::Error::new(e).context("Failed to establish streaming session")
    })?;
    let session_id = conn.session_id.clone();

    source.start(frame_tx).context("Failed to start audio capture")?;
    println!(
        "Session {} started. Speak now; press Ctrl+C to stop.",
        session_id
    );

    let mut reporter = ConsoleReporter::new();
    let outcome = StreamSession::new(conn, timeouts)
        .run(&monitor, frame_rx, stop_rx, &mut reporter)
        .await;
    source.stop();

    let outcome = conclude_stream(source.take_error(), outcome)?;
    println!(
        "Session {} closed: {} frames sent, {} results received.",
        session_id, outcome.frames_sent, outcome.events_received
    );
    Ok(())
}

/// A capture failure explains whatever the session observed afterwards
/// (closed frame channel, empty drain), so it takes precedence over
/// the session's own result.
fn conclude_stream(
    capture_error: Option<RelayError>,
    outcome: Result<SessionOutcome, RelayError>,
) -> Result<SessionOutcome> {
    if let Some(e) = capture_error {
        return Err(anyhow::Error::new(e).context("Audio capture failed"));
    }
    outcome.map_err(|e| anyhow::Error::new(e).context("Streaming session failed"))
}

fn describe_status(job: &crate::domain::types::BatchJob) -> String {
    use crate::domain::types::JobStatus::*;
    match job.status {
        Queued => "queued".to_string(),
        InProgress => "in progress".to_string(),
        Completed => "completed".to_string(),
        Failed => "failed".to_string(),
    }
}

/// Submit a batch job and, unless told otherwise, poll it to completion.
pub async fn handle_batch(config: &Config, args: &BatchArgs) -> Result<()> {
    let mut config = config.clone();
    if let Some(language) = &args.language {
        config.language = language.clone();
    }
    if let Some(endpoint) = &args.endpoint {
        config.batch_endpoint = Some(endpoint.clone());
    }

    let client = BatchClient::new(config.batch_url()?, config.resolve_auth_token());
    let request = SubmitRequest {
        source_ref: args.source_ref.clone(),
        format: args.format.clone(),
        language: config.language.clone(),
    };
    let job_id = client
        .submit(&request)
        .await
        .context("Failed to submit batch job")?;
    println!("Submitted job {}", job_id);

    if args.no_wait {
        return Ok(());
    }

    let interval = Duration::from_secs(config.poll_interval_secs);
    let mut last_status = None;
    let result = wait_for_completion(&client, &job_id, interval, |job| {
        if last_status != Some(job.status) {
            println!("Job {} is {}", job.job_id, describe_status(job));
            last_status = Some(job.status);
        }
    })
    .await;

    match result {
        Ok(job) => {
            match job.result_ref {
                Some(result_ref) => println!("Transcript available at {}", result_ref),
                None => println!("Job {} completed.", job.job_id),
            }
            Ok(())
        }
        Err(RelayError::JobFailed(reason)) => {
            println!("Job {} failed: {}", job_id, reason);
            Err(RelayError::JobFailed(reason).into())
        }
        Err(e) => Err(anyhow::Error::new(e).context("Failed to poll batch job")),
    }
}

/// Print the available input devices.
pub fn handle_devices() -> Result<()> {
    let devices = list_input_devices()?;
    if devices.is_empty() {
        println!("No audio input devices found.");
        return Ok(());
    }
    println!("Available input devices:");
    for device in devices {
        println!(
            "  {} ({} ch, {} Hz)",
            device.name, device.channels, device.default_sample_rate
        );
    }
    Ok(())
}

/// Record briefly and report whether the microphone picks anything up.
pub fn handle_mic_check(args: &MicCheckArgs) -> Result<()> {
    println!("Recording for {} seconds...", args.seconds);
    let report = mic_check(Duration::from_secs(args.seconds))?;
    println!(
        "Captured {} samples, peak {:.4}, RMS {:.4}",
        report.samples, report.peak, report.rms
    );
    if report.looks_live() {
        println!("Microphone looks good.");
    } else {
        println!("No signal detected. Check the input device and its volume.");
    }
    Ok(())
}
