//! Shared types used across multiple modules.
//!
//! This module contains the core data model: captured audio frames,
//! transcript events from the remote service, batch job state, and the
//! streaming session lifecycle.

use serde::{Deserialize, Serialize};

/// A fixed-size chunk of captured PCM audio (s16le bytes), tagged with
/// its capture sequence number.
///
/// Produced by a frame source, consumed exactly once by the relay's send
/// path, then dropped. Sequence numbers increase monotonically over
/// captured frames, so a dropped frame is observable downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub seq: u64,
    pub data: Vec<u8>,
}

impl AudioFrame {
    pub fn new(seq: u64, data: Vec<u8>) -> Self {
        Self { seq, data }
    }

    /// Number of s16le samples in this frame.
    pub fn sample_count(&self) -> usize {
        self.data.len() / 2
    }
}

/// A transcript segment emitted by the remote service.
///
/// Partial events are unstable and may be revised; a final event for a
/// time range supersedes all prior partials for that range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub text: String,
    pub is_final: bool,
    /// Offset of the segment start from the beginning of the audio, ms.
    pub start_ms: u64,
    /// Offset of the segment end from the beginning of the audio, ms.
    pub end_ms: u64,
    /// Service-reported confidence in [0, 1].
    pub confidence: f32,
}

impl TranscriptEvent {
    /// True when this event's time range overlaps `[start_ms, end_ms)`.
    pub fn overlaps(&self, start_ms: u64, end_ms: u64) -> bool {
        self.start_ms < end_ms && start_ms < self.end_ms
    }
}

/// Lifecycle of one streaming session.
///
/// `Failed` is terminal and reachable from any non-terminal state on an
/// unrecoverable transport, auth, or throttling error.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SessionState {
    Idle,
    Connecting,
    Streaming,
    Draining,
    Closed,
    Failed,
}

impl SessionState {
    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Idle, Connecting) => true,
            (Connecting, Streaming) => true,
            (Streaming, Draining) => true,
            // Forced stop and early server end-of-stream skip the drain.
            (Streaming, Closed) => true,
            (Draining, Closed) => true,
            (Idle | Connecting | Streaming | Draining, Failed) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

/// Status of a batch transcription job on the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// A batch transcription job as reported by the remote service.
///
/// Created on submission and polled until a terminal status; the client
/// holds no further state once it is discarded (results live remotely).
#[derive(Debug, Clone, PartialEq)]
pub struct BatchJob {
    pub job_id: String,
    pub source_ref: String,
    pub status: JobStatus,
    /// Location of the transcript, present once `status` is `Completed`.
    pub result_ref: Option<String>,
    /// Remote-provided failure reason, present once `status` is `Failed`.
    pub failure_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_frame_sample_count() {
        let frame = AudioFrame::new(0, vec![0u8; 2048]);
        assert_eq!(frame.sample_count(), 1024);
    }

    #[test]
    fn test_transcript_overlap() {
        let ev = TranscriptEvent {
            text: "hello".into(),
            is_final: false,
            start_ms: 100,
            end_ms: 500,
            confidence: 0.8,
        };
        assert!(ev.overlaps(400, 600));
        assert!(ev.overlaps(0, 101));
        assert!(!ev.overlaps(500, 600));
        assert!(!ev.overlaps(0, 100));
    }

    #[test]
    fn test_session_state_happy_path() {
        use SessionState::*;
        assert!(Idle.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Streaming));
        assert!(Streaming.can_transition_to(Draining));
        assert!(Draining.can_transition_to(Closed));
    }

    #[test]
    fn test_session_state_failure_from_anywhere() {
        use SessionState::*;
        for state in [Idle, Connecting, Streaming, Draining] {
            assert!(state.can_transition_to(Failed), "{:?} -> Failed", state);
        }
        assert!(!Closed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Closed));
    }

    #[test]
    fn test_session_state_no_resume() {
        use SessionState::*;
        // A dropped stream cannot be resumed mid-session.
        assert!(!Failed.can_transition_to(Streaming));
        assert!(!Closed.can_transition_to(Connecting));
        assert!(!Draining.can_transition_to(Streaming));
    }

    #[test]
    fn test_job_status_terminal() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_job_status_serde_names() {
        assert_eq!(
            serde_json::to_string(&JobStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        let s: JobStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(s, JobStatus::Completed);
    }
}
