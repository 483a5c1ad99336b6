//! Streaming relay: session lifecycle, transport, and wire protocol.
//!
//! A session moves through `Idle -> Connecting -> Streaming -> Draining
//! -> Closed`, with `Failed` reachable from any non-terminal state. The
//! relay forwards captured frames to the endpoint and feeds transcript
//! events back to the reporter.

pub mod protocol;
pub mod session;
pub mod transport;

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::domain::types::SessionState;
use crate::error::RelayError;

pub use session::{SessionOutcome, StreamSession};
pub use transport::{AudioTx, EventRx, StreamingConnection, WsConnection};

/// How the user asked the session to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// Finish sending, then wait out the drain window for late results.
    Graceful,
    /// Second stop request: close immediately, discard pending results.
    Forced,
}

/// Timeouts governing a streaming session.
#[derive(Debug, Clone, Copy)]
pub struct SessionTimeouts {
    pub connect: Duration,
    pub drain: Duration,
}

impl SessionTimeouts {
    pub fn new(connect_secs: u64, drain_secs: u64) -> Self {
        Self {
            connect: Duration::from_secs(connect_secs),
            drain: Duration::from_secs(drain_secs),
        }
    }
}

/// Tracks the session state and its transition history.
///
/// Transitions are validated against the lifecycle graph; an invalid
/// transition is a logic error and is rejected with a warning rather
/// than corrupting the recorded history.
#[derive(Debug)]
pub struct SessionMonitor {
    inner: Mutex<MonitorInner>,
}

#[derive(Debug)]
struct MonitorInner {
    current: SessionState,
    history: Vec<SessionState>,
}

impl SessionMonitor {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MonitorInner {
                current: SessionState::Idle,
                history: vec![SessionState::Idle],
            }),
        }
    }

    /// Move to `next` if the lifecycle allows it. Returns whether the
    /// transition was applied.
    pub fn transition(&self, next: SessionState) -> bool {
        let mut inner = self.inner.lock();
        if !inner.current.can_transition_to(next) {
            warn!(from = ?inner.current, to = ?next, "rejected invalid state transition");
            return false;
        }
        info!(from = ?inner.current, to = ?next, "session state change");
        inner.current = next;
        inner.history.push(next);
        true
    }

    pub fn current(&self) -> SessionState {
        self.inner.lock().current
    }

    pub fn history(&self) -> Vec<SessionState> {
        self.inner.lock().history.clone()
    }
}

impl Default for SessionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Bound a connect future with the configured timeout, mapping the
/// elapsed case into the failure taxonomy.
pub async fn connect_with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, RelayError>
where
    F: std::future::Future<Output = Result<T, RelayError>>,
{
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(RelayError::TransportError(format!(
            "connection attempt timed out after {:?}",
            limit
        ))),
    }
}
