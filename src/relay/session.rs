//! The streaming session driver.
//!
//! One task owns both directions of the connection and multiplexes
//! frame forwarding, transcript delivery, and stop requests with
//! `select!`. Frames are sent strictly in capture order; transcript
//! events are handed to the sink as they arrive, so a slow endpoint
//! never blocks capture and a burst of results never blocks sending.

use async_channel::Receiver;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use crate::domain::traits::TranscriptSink;
use crate::domain::types::{AudioFrame, SessionState};
use crate::error::RelayError;
use crate::relay::transport::{AudioTx, EventRx, StreamingConnection};
use crate::relay::{SessionMonitor, SessionTimeouts, StopSignal};

/// Counters and terminal state from a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOutcome {
    pub frames_sent: u64,
    pub events_received: u64,
    pub final_state: SessionState,
}

/// Drives one established connection from `Streaming` to a terminal
/// state.
pub struct StreamSession<C: StreamingConnection> {
    conn: C,
    timeouts: SessionTimeouts,
}

fn fail(monitor: &SessionMonitor, err: RelayError) -> RelayError {
    monitor.transition(SessionState::Failed);
    err
}

impl<C: StreamingConnection> StreamSession<C> {
    /// Wrap an already-established connection. The monitor is expected
    /// to be in `Connecting`.
    pub fn new(conn: C, timeouts: SessionTimeouts) -> Self {
        Self { conn, timeouts }
    }

    /// Run the session to completion.
    ///
    /// `frames` closing means the source is exhausted or stopped; the
    /// session then signals end-of-audio and drains late results until
    /// the endpoint's end-of-stream. An endpoint that does not finish
    /// within the drain window fails the session. A second stop request
    /// at any point closes immediately, discarding whatever the
    /// endpoint has not yet delivered.
    pub async fn run(
        self,
        monitor: &SessionMonitor,
        frames: Receiver<AudioFrame>,
        stop: Receiver<StopSignal>,
        sink: &mut dyn TranscriptSink,
    ) -> Result<SessionOutcome, RelayError> {
        monitor.transition(SessionState::Streaming);
        let (mut tx, mut rx) = self.conn.split();

        let mut frames_sent: u64 = 0;
        let mut events_received: u64 = 0;
        let mut next_seq: Option<u64> = None;
        let mut stop_open = true;

        let outcome = |frames_sent, events_received, monitor: &SessionMonitor| SessionOutcome {
            frames_sent,
            events_received,
            final_state: monitor.current(),
        };

        // Streaming phase: forward frames until the source is done or
        // the user asks to stop. Events are polled ahead of frames so
        // transcript delivery stays live even against a source that is
        // continuously ready, such as an unpaced file replay.
        loop {
            tokio::select! {
                biased;

                sig = stop.recv(), if stop_open => match sig {
                    Ok(StopSignal::Graceful) => {
                        debug!("stop requested, signaling end of audio");
                        tx.finish().await.map_err(|e| fail(monitor, e))?;
                        monitor.transition(SessionState::Draining);
                        break;
                    }
                    Ok(StopSignal::Forced) => {
                        warn!("forced stop while streaming, closing immediately");
                        monitor.transition(SessionState::Closed);
                        return Ok(outcome(frames_sent, events_received, monitor));
                    }
                    Err(_) => stop_open = false,
                },

                event = rx.next_event() => match event {
                    Ok(Some(event)) => {
                        events_received += 1;
                        sink.report(&event);
                    }
                    Ok(None) => {
                        // Endpoint ended the stream before we finished
                        // sending. Results delivered so far stand.
                        warn!("endpoint ended stream early");
                        monitor.transition(SessionState::Closed);
                        return Ok(outcome(frames_sent, events_received, monitor));
                    }
                    Err(e) => return Err(fail(monitor, e)),
                },

                frame = frames.recv() => match frame {
                    Ok(frame) => {
                        if let Some(expected) = next_seq {
                            if frame.seq != expected {
                                warn!(expected, got = frame.seq, "gap in frame sequence");
                            }
                        }
                        next_seq = Some(frame.seq + 1);
                        tx.send_frame(&frame).await.map_err(|e| fail(monitor, e))?;
                        frames_sent += 1;
                    }
                    Err(_) => {
                        debug!(frames_sent, "audio source exhausted, signaling end of audio");
                        tx.finish().await.map_err(|e| fail(monitor, e))?;
                        monitor.transition(SessionState::Draining);
                        break;
                    }
                },
            }
        }

        // Drain phase: collect late results until end-of-stream, the
        // drain deadline, or a second stop request.
        let deadline = Instant::now() + self.timeouts.drain;
        loop {
            tokio::select! {
                biased;

                sig = stop.recv(), if stop_open => match sig {
                    Ok(_) => {
                        warn!("stop requested during drain, discarding pending results");
                        monitor.transition(SessionState::Closed);
                        return Ok(outcome(frames_sent, events_received, monitor));
                    }
                    Err(_) => stop_open = false,
                },

                event = timeout_at(deadline, rx.next_event()) => match event {
                    Ok(Ok(Some(event))) => {
                        events_received += 1;
                        sink.report(&event);
                    }
                    Ok(Ok(None)) => {
                        debug!(events_received, "endpoint signaled end of stream");
                        monitor.transition(SessionState::Closed);
                        return Ok(outcome(frames_sent, events_received, monitor));
                    }
                    Ok(Err(e)) => return Err(fail(monitor, e)),
                    Err(_) => {
                        return Err(fail(
                            monitor,
                            RelayError::TransportError(format!(
                                "endpoint did not finish within the {:?} drain window",
                                self.timeouts.drain
                            )),
                        ));
                    }
                },
            }
        }
    }
}
