//! Core domain traits for dependency inversion.
//!
//! These traits define contracts between layers without depending on
//! concrete implementations. They enable:
//! - Testability via mock implementations
//! - Swapping the audio source (microphone vs. WAV file)
//! - A clear boundary between the receive path and the output sink

use crate::domain::types::{AudioFrame, TranscriptEvent};
use crate::error::RelayError;
use anyhow::Result;
use async_channel::Sender;

/// Audio frame production abstraction.
///
/// Implementors capture fixed-size PCM frames (microphone, WAV file) on
/// their own thread and push them into the provided channel in strict
/// capture order. Closing the channel signals that the source is
/// exhausted or has been stopped.
pub trait FrameSource: Send + Sync {
    /// Start producing frames into `frames`.
    ///
    /// Returns `Err` if the underlying device or file cannot be opened.
    fn start(&self, frames: Sender<AudioFrame>) -> Result<()>;

    /// Stop producing frames and release the underlying device.
    ///
    /// Idempotent; the capture thread closes the frame channel when it
    /// observes the stop request.
    fn stop(&self);

    /// Check if the source is currently producing frames.
    fn is_active(&self) -> bool;

    /// Failure that ended capture after `start` returned, if any.
    ///
    /// A source running on its own thread cannot return late errors
    /// from `start`; it records the error, closes the frame channel,
    /// and the caller collects the reason here once the channel is
    /// drained. Taking the error clears it.
    fn take_error(&self) -> Option<RelayError> {
        None
    }
}

/// Output sink for transcript events.
///
/// Implementors format and emit events as they arrive from the receive
/// path. `report` must not block significantly: the receive path calls
/// it inline and must never apply backpressure to the transport.
pub trait TranscriptSink: Send {
    fn report(&mut self, event: &TranscriptEvent);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct TestSource {
        active: AtomicBool,
    }

    impl FrameSource for TestSource {
        fn start(&self, frames: Sender<AudioFrame>) -> Result<()> {
            self.active.store(true, Ordering::SeqCst);
            for seq in 0..3 {
                frames
                    .try_send(AudioFrame::new(seq, vec![0u8; 4]))
                    .map_err(|e| anyhow::anyhow!("frame channel closed: {}", e))?;
            }
            Ok(())
        }

        fn stop(&self) {
            self.active.store(false, Ordering::SeqCst);
        }

        fn is_active(&self) -> bool {
            self.active.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_frame_source_preserves_order() {
        let source = TestSource {
            active: AtomicBool::new(false),
        };
        let (tx, rx) = async_channel::bounded(8);

        source.start(tx).unwrap();
        assert!(source.is_active());

        let mut seqs = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            seqs.push(frame.seq);
        }
        assert_eq!(seqs, vec![0, 1, 2]);

        source.stop();
        assert!(!source.is_active());
    }

    #[test]
    fn test_failed_source_surfaces_error_after_channel_close() {
        use parking_lot::Mutex;

        struct FailingSource {
            failure: Mutex<Option<RelayError>>,
        }

        impl FrameSource for FailingSource {
            fn start(&self, frames: Sender<AudioFrame>) -> Result<()> {
                // Device opens fine, then the stream dies.
                *self.failure.lock() =
                    Some(RelayError::DevicePermissionDenied("mic access revoked".into()));
                frames.close();
                Ok(())
            }

            fn stop(&self) {}

            fn is_active(&self) -> bool {
                false
            }

            fn take_error(&self) -> Option<RelayError> {
                self.failure.lock().take()
            }
        }

        let source = FailingSource {
            failure: Mutex::new(None),
        };
        let (tx, rx) = async_channel::bounded(8);
        source.start(tx).unwrap();

        // The consumer sees an ordinary closed channel...
        assert!(rx.try_recv().is_err());
        // ...and the reason is waiting to be collected, exactly once.
        assert!(matches!(
            source.take_error(),
            Some(RelayError::DevicePermissionDenied(_))
        ));
        assert!(source.take_error().is_none());
    }

    #[test]
    fn test_sink_as_trait_object() {
        struct CountingSink(usize);
        impl TranscriptSink for CountingSink {
            fn report(&mut self, _event: &TranscriptEvent) {
                self.0 += 1;
            }
        }

        let mut sink: Box<dyn TranscriptSink> = Box::new(CountingSink(0));
        let ev = TranscriptEvent {
            text: "ok".into(),
            is_final: true,
            start_ms: 0,
            end_ms: 100,
            confidence: 1.0,
        };
        sink.report(&ev);
        sink.report(&ev);
    }
}
