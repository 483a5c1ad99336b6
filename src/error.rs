//! Failure taxonomy for the relay.
//!
//! Local capture failures and remote session/job failures are kept as
//! distinct variants so callers can tell which stage broke and print the
//! underlying reason verbatim. Application plumbing wraps these in
//! `anyhow::Result` with call-site context.

use thiserror::Error;

/// Errors surfaced by the capture, relay, and batch layers.
///
/// All variants are fatal to the current session or job, never to the
/// process: the interactive menu survives and can start a fresh session.
#[derive(Debug, Error)]
pub enum RelayError {
    /// No usable audio input device was found.
    #[error("no audio input device available")]
    DeviceUnavailable,

    /// The OS refused access to the input device.
    #[error("audio input access denied: {0}")]
    DevicePermissionDenied(String),

    /// The remote endpoint rejected our credentials.
    #[error("authentication rejected by endpoint: {0}")]
    AuthenticationFailure(String),

    /// The remote endpoint refused the request due to quota or rate limits.
    #[error("request throttled by endpoint: {0}")]
    Throttled(String),

    /// Connection-level failure: establishment timeout, dropped socket,
    /// malformed server message.
    #[error("transport error: {0}")]
    TransportError(String),

    /// The batch endpoint has no job with the queried identifier.
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// The batch job reached the Failed state; carries the remote-provided
    /// reason verbatim.
    #[error("job failed: {0}")]
    JobFailed(String),

    /// Invalid or missing configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RelayError {
    /// True for failures that end the current session or job; a dropped
    /// stream cannot be resumed mid-session.
    pub fn is_session_fatal(&self) -> bool {
        !matches!(self, RelayError::Config(_))
    }
}

pub type RelayResult<T> = Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_reason_verbatim() {
        let err = RelayError::JobFailed("Unsupported media format: ogg".to_string());
        assert_eq!(err.to_string(), "job failed: Unsupported media format: ogg");
    }

    #[test]
    fn test_device_unavailable_message() {
        let err = RelayError::DeviceUnavailable;
        assert!(err.to_string().contains("no audio input device"));
    }

    #[test]
    fn test_config_error_not_session_fatal() {
        assert!(!RelayError::Config("missing endpoint".into()).is_session_fatal());
        assert!(RelayError::TransportError("reset".into()).is_session_fatal());
    }
}
