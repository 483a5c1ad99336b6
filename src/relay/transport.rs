//! Streaming transport abstraction and its WebSocket implementation.
//!
//! The session logic is written against small send/receive traits so it
//! can run unchanged against an in-memory mock in tests. The production
//! transport is a WebSocket carrying the JSON/binary protocol from
//! [`crate::relay::protocol`].

use std::future::Future;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use crate::domain::types::{AudioFrame, TranscriptEvent};
use crate::error::RelayError;
use crate::relay::protocol::{map_server_error, ClientMessage, ServerMessage, StartRequest};

/// A connection that can be split into independent send and receive
/// halves, so the two flows run concurrently without shared state.
pub trait StreamingConnection {
    type Tx: AudioTx;
    type Rx: EventRx;

    fn split(self) -> (Self::Tx, Self::Rx);
}

/// Send half: forwards audio frames in order, then signals end-of-audio.
pub trait AudioTx {
    fn send_frame(
        &mut self,
        frame: &AudioFrame,
    ) -> impl Future<Output = Result<(), RelayError>> + Send;

    /// Signal end-of-audio; no frames may be sent afterwards.
    fn finish(&mut self) -> impl Future<Output = Result<(), RelayError>> + Send;
}

/// Receive half: yields transcript events until the endpoint signals
/// end-of-stream (`Ok(None)`).
pub trait EventRx {
    fn next_event(
        &mut self,
    ) -> impl Future<Output = Result<Option<TranscriptEvent>, RelayError>> + Send;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket connection to the streaming endpoint.
pub struct WsConnection {
    ws: WsStream,
    pub session_id: String,
}

impl WsConnection {
    /// Open the socket, send the session-initiation message, and wait
    /// for the `started` acknowledgment.
    ///
    /// The caller bounds this with the connect timeout; an `error`
    /// answer instead of `started` maps to the failure taxonomy.
    pub async fn connect(
        url: &str,
        start: &StartRequest,
        auth_token: Option<&str>,
    ) -> Result<Self, RelayError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| RelayError::TransportError(format!("invalid endpoint URL: {}", e)))?;
        if let Some(token) = auth_token {
            let value = format!("Bearer {}", token)
                .parse()
                .map_err(|_| RelayError::Config("auth token is not a valid header value".into()))?;
            request.headers_mut().insert("Authorization", value);
        }

        let (mut ws, _response) = connect_async(request)
            .await
            .map_err(|e| RelayError::TransportError(e.to_string()))?;

        let start_json = serde_json::to_string(&ClientMessage::Start(start.clone()))
            .map_err(|e| RelayError::TransportError(e.to_string()))?;
        ws.send(Message::Text(start_json))
            .await
            .map_err(|e| RelayError::TransportError(e.to_string()))?;

        // The endpoint may interleave pings before acknowledging.
        loop {
            let msg = ws.next().await.ok_or_else(|| {
                RelayError::TransportError("connection closed before session ack".into())
            })?;
            let msg = msg.map_err(|e| RelayError::TransportError(e.to_string()))?;
            match msg {
                Message::Text(text) => match ServerMessage::parse(&text)? {
                    ServerMessage::Started { session_id } => {
                        debug!(session_id, "session established");
                        return Ok(Self { ws, session_id });
                    }
                    ServerMessage::Error { code, message } => {
                        return Err(map_server_error(&code, message));
                    }
                    other => {
                        return Err(RelayError::TransportError(format!(
                            "unexpected message before session ack: {:?}",
                            other
                        )));
                    }
                },
                Message::Ping(_) | Message::Pong(_) => continue,
                Message::Close(_) => {
                    return Err(RelayError::TransportError(
                        "endpoint closed connection during handshake".into(),
                    ));
                }
                other => {
                    return Err(RelayError::TransportError(format!(
                        "unexpected frame before session ack: {:?}",
                        other
                    )));
                }
            }
        }
    }
}

impl StreamingConnection for WsConnection {
    type Tx = WsAudioTx;
    type Rx = WsEventRx;

    fn split(self) -> (Self::Tx, Self::Rx) {
        let (sink, stream) = self.ws.split();
        (WsAudioTx { sink }, WsEventRx { stream })
    }
}

pub struct WsAudioTx {
    sink: SplitSink<WsStream, Message>,
}

impl AudioTx for WsAudioTx {
    async fn send_frame(&mut self, frame: &AudioFrame) -> Result<(), RelayError> {
        trace!(seq = frame.seq, bytes = frame.data.len(), "sending frame");
        self.sink
            .send(Message::Binary(frame.data.clone()))
            .await
            .map_err(|e| RelayError::TransportError(e.to_string()))
    }

    async fn finish(&mut self) -> Result<(), RelayError> {
        let end = serde_json::to_string(&ClientMessage::End)
            .map_err(|e| RelayError::TransportError(e.to_string()))?;
        self.sink
            .send(Message::Text(end))
            .await
            .map_err(|e| RelayError::TransportError(e.to_string()))
    }
}

pub struct WsEventRx {
    stream: SplitStream<WsStream>,
}

impl EventRx for WsEventRx {
    async fn next_event(&mut self) -> Result<Option<TranscriptEvent>, RelayError> {
        loop {
            let Some(msg) = self.stream.next().await else {
                // Socket gone without a protocol-level end marker; the
                // results already delivered remain valid.
                return Ok(None);
            };
            let msg = msg.map_err(|e| RelayError::TransportError(e.to_string()))?;
            match msg {
                Message::Text(text) => match ServerMessage::parse(&text)? {
                    ServerMessage::Transcript(event) => return Ok(Some(event)),
                    ServerMessage::End => return Ok(None),
                    ServerMessage::Error { code, message } => {
                        return Err(map_server_error(&code, message));
                    }
                    ServerMessage::Started { .. } => continue,
                },
                Message::Close(_) => return Ok(None),
                Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_) => {
                    continue;
                }
            }
        }
    }
}
