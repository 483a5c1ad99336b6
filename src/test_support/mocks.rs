//! In-memory transport and sink doubles for session tests.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::domain::traits::TranscriptSink;
use crate::domain::types::{AudioFrame, TranscriptEvent};
use crate::error::RelayError;
use crate::relay::transport::{AudioTx, EventRx, StreamingConnection};

/// One scripted reaction from the fake endpoint.
pub enum MockServerEvent {
    Transcript(TranscriptEvent),
    EndOfStream,
    Fail(RelayError),
}

#[derive(Default)]
struct LogInner {
    sent_seqs: Vec<u64>,
    finish_called: bool,
}

/// Records everything the session sent, for assertions after `run`.
#[derive(Clone, Default)]
pub struct MockTransportLog {
    inner: Arc<Mutex<LogInner>>,
}

impl MockTransportLog {
    pub fn sent_seqs(&self) -> Vec<u64> {
        self.inner.lock().sent_seqs.clone()
    }

    pub fn finish_called(&self) -> bool {
        self.inner.lock().finish_called
    }
}

/// Transport double whose receive side replays scripted events.
///
/// When the script runs out (the sender side is dropped without an
/// explicit `EndOfStream`), the receive half stays silent forever,
/// which is how drain timeouts are exercised.
pub struct MockConnection {
    log: MockTransportLog,
    events: async_channel::Receiver<MockServerEvent>,
}

impl MockConnection {
    pub fn new() -> (
        Self,
        async_channel::Sender<MockServerEvent>,
        MockTransportLog,
    ) {
        let (tx, rx) = async_channel::unbounded();
        let log = MockTransportLog::default();
        (
            Self {
                log: log.clone(),
                events: rx,
            },
            tx,
            log,
        )
    }
}

impl StreamingConnection for MockConnection {
    type Tx = MockAudioTx;
    type Rx = MockEventRx;

    fn split(self) -> (Self::Tx, Self::Rx) {
        (
            MockAudioTx { log: self.log },
            MockEventRx {
                events: self.events,
            },
        )
    }
}

pub struct MockAudioTx {
    log: MockTransportLog,
}

impl AudioTx for MockAudioTx {
    async fn send_frame(&mut self, frame: &AudioFrame) -> Result<(), RelayError> {
        self.log.inner.lock().sent_seqs.push(frame.seq);
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), RelayError> {
        self.log.inner.lock().finish_called = true;
        Ok(())
    }
}

pub struct MockEventRx {
    events: async_channel::Receiver<MockServerEvent>,
}

impl EventRx for MockEventRx {
    async fn next_event(&mut self) -> Result<Option<TranscriptEvent>, RelayError> {
        match self.events.recv().await {
            Ok(MockServerEvent::Transcript(ev)) => Ok(Some(ev)),
            Ok(MockServerEvent::EndOfStream) => Ok(None),
            Ok(MockServerEvent::Fail(e)) => Err(e),
            // Script exhausted without an end marker: endpoint goes quiet.
            Err(_) => std::future::pending().await,
        }
    }
}

/// Sink that records every reported event.
#[derive(Default)]
pub struct VecSink {
    pub events: Vec<TranscriptEvent>,
}

impl TranscriptSink for VecSink {
    fn report(&mut self, event: &TranscriptEvent) {
        self.events.push(event.clone());
    }
}

/// Build a transcript event with the fields tests care about.
pub fn event(text: &str, is_final: bool, start_ms: u64, end_ms: u64) -> TranscriptEvent {
    TranscriptEvent {
        text: text.to_string(),
        is_final,
        start_ms,
        end_ms,
        confidence: 0.9,
    }
}
