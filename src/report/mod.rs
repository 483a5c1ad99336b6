//! Transcript reporting.
//!
//! Display policy: partial results are transient and each one replaces
//! the previous partial for the same stretch of audio; a final result
//! commits the text permanently and clears the pending partial it
//! supersedes. Partials that arrive for audio already committed are
//! ignored.
//!
//! The decision logic is a pure state machine so it can be tested
//! without a terminal; `ConsoleReporter` applies the decisions with
//! carriage-return rewriting on stdout.

use std::io::{self, Write};

use chrono::Local;
use tracing::debug;

use crate::domain::traits::TranscriptSink;
use crate::domain::types::TranscriptEvent;

/// What the display should do with an incoming event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayAction {
    /// Show as the current transient line, replacing any prior partial.
    Partial,
    /// Commit permanently, clearing the transient line.
    Commit,
    /// Stale event for already-committed audio; show nothing.
    Ignore,
}

/// Replace-on-final bookkeeping.
#[derive(Debug, Default)]
pub struct DisplayState {
    /// Time range of the partial currently on screen, if any.
    pending: Option<(u64, u64)>,
    /// Everything up to this offset has been committed by finals.
    committed_through_ms: u64,
}

impl DisplayState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &TranscriptEvent) -> DisplayAction {
        if event.is_final {
            self.committed_through_ms = self.committed_through_ms.max(event.end_ms);
            // The final supersedes whatever partial was pending for
            // this range.
            if let Some((start, end)) = self.pending {
                if event.overlaps(start, end) {
                    self.pending = None;
                }
            }
            return DisplayAction::Commit;
        }

        if event.end_ms <= self.committed_through_ms {
            debug!(
                end_ms = event.end_ms,
                committed_through_ms = self.committed_through_ms,
                "ignoring stale partial"
            );
            return DisplayAction::Ignore;
        }

        self.pending = Some((event.start_ms, event.end_ms));
        DisplayAction::Partial
    }

    pub fn has_pending_partial(&self) -> bool {
        self.pending.is_some()
    }
}

/// Format one committed transcript line with a wall-clock timestamp.
pub fn format_line(event: &TranscriptEvent) -> String {
    let now = Local::now();
    format!(
        "[{}] {} (Confidence: {:.2})",
        now.format("%H:%M:%S"),
        event.text,
        event.confidence
    )
}

/// Console sink: partials rewrite a single transient line, finals print
/// a timestamped line and move on.
pub struct ConsoleReporter {
    state: DisplayState,
    /// Width of the transient line currently on screen, for clearing.
    transient_width: usize,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self {
            state: DisplayState::new(),
            transient_width: 0,
        }
    }

    fn clear_transient(&mut self, out: &mut impl Write) {
        if self.transient_width > 0 {
            let _ = write!(out, "\r{}\r", " ".repeat(self.transient_width));
            self.transient_width = 0;
        }
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptSink for ConsoleReporter {
    fn report(&mut self, event: &TranscriptEvent) {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        match self.state.apply(event) {
            DisplayAction::Partial => {
                self.clear_transient(&mut out);
                let line = format!("... {}", event.text);
                let _ = write!(out, "\r{}", line);
                self.transient_width = line.chars().count();
            }
            DisplayAction::Commit => {
                self.clear_transient(&mut out);
                let _ = writeln!(out, "{}", format_line(event));
            }
            DisplayAction::Ignore => {}
        }
        let _ = out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(text: &str, is_final: bool, start_ms: u64, end_ms: u64) -> TranscriptEvent {
        TranscriptEvent {
            text: text.to_string(),
            is_final,
            start_ms,
            end_ms,
            confidence: 0.87,
        }
    }

    #[test]
    fn test_partial_replaces_partial() {
        let mut state = DisplayState::new();
        assert_eq!(state.apply(&event("he", false, 0, 200)), DisplayAction::Partial);
        assert_eq!(
            state.apply(&event("hello", false, 0, 450)),
            DisplayAction::Partial
        );
        assert!(state.has_pending_partial());
    }

    #[test]
    fn test_final_commits_and_clears_pending() {
        let mut state = DisplayState::new();
        state.apply(&event("hello wor", false, 0, 800));
        assert_eq!(
            state.apply(&event("hello world", true, 0, 900)),
            DisplayAction::Commit
        );
        assert!(!state.has_pending_partial());
    }

    #[test]
    fn test_stale_partial_after_final_is_ignored() {
        let mut state = DisplayState::new();
        state.apply(&event("hello world", true, 0, 900));
        assert_eq!(
            state.apply(&event("hello wor", false, 100, 850)),
            DisplayAction::Ignore
        );
        assert!(!state.has_pending_partial());
    }

    #[test]
    fn test_partial_for_new_audio_after_final_displays() {
        let mut state = DisplayState::new();
        state.apply(&event("hello world", true, 0, 900));
        assert_eq!(
            state.apply(&event("how are", false, 950, 1400)),
            DisplayAction::Partial
        );
    }

    #[test]
    fn test_final_without_prior_partial_commits() {
        let mut state = DisplayState::new();
        assert_eq!(
            state.apply(&event("short utterance", true, 0, 600)),
            DisplayAction::Commit
        );
    }

    #[test]
    fn test_non_overlapping_final_keeps_pending_partial() {
        let mut state = DisplayState::new();
        state.apply(&event("next phrase", false, 1000, 1500));
        // Final for an earlier range does not touch the newer partial.
        state.apply(&event("first phrase", true, 0, 900));
        assert!(state.has_pending_partial());
    }

    #[test]
    fn test_format_line_shape() {
        let line = format_line(&event("hello world", true, 0, 900));
        assert!(line.contains("hello world"));
        assert!(line.contains("(Confidence: 0.87)"));
        // [HH:MM:SS] prefix
        assert_eq!(line.as_bytes()[0], b'[');
        assert_eq!(line.as_bytes()[9], b']');
    }
}
