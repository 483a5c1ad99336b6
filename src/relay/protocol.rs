//! Wire protocol for the streaming endpoint.
//!
//! Control messages are JSON text frames; audio travels as raw binary
//! PCM frames. The server answers the `start` message with `started`,
//! then emits `transcript` events until it sees `end` from the client
//! and closes with its own `end`.

use serde::{Deserialize, Serialize};

use crate::domain::types::TranscriptEvent;
use crate::error::RelayError;

/// Session-initiation parameters sent as the first message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StartRequest {
    pub encoding: String,
    pub sample_rate_hz: u32,
    pub channels: u16,
    pub language: String,
    pub region: String,
}

impl StartRequest {
    pub fn pcm_s16le(sample_rate_hz: u32, channels: u16, language: &str, region: &str) -> Self {
        Self {
            encoding: "pcm_s16le".to_string(),
            sample_rate_hz,
            channels,
            language: language.to_string(),
            region: region.to_string(),
        }
    }
}

/// Client-to-server control messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Start(StartRequest),
    /// End-of-audio: no further binary frames will follow.
    End,
}

/// Server-to-client messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Started {
        session_id: String,
    },
    Transcript(TranscriptEvent),
    /// End-of-stream: all results for the sent audio have been delivered.
    End,
    Error {
        code: String,
        message: String,
    },
}

impl ServerMessage {
    pub fn parse(text: &str) -> Result<Self, RelayError> {
        serde_json::from_str(text)
            .map_err(|e| RelayError::TransportError(format!("malformed server message: {}", e)))
    }
}

/// Map a server-reported error to the failure taxonomy, keeping the
/// remote-provided reason verbatim.
pub fn map_server_error(code: &str, message: String) -> RelayError {
    match code {
        "auth" | "unauthorized" => RelayError::AuthenticationFailure(message),
        "throttled" | "rate_limited" => RelayError::Throttled(message),
        _ => RelayError::TransportError(message),
    }
}
