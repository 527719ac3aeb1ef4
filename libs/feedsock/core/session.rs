use crate::traits::error::{FeedError, Result};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Instant;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::debug;

/// One inbound data frame, before decoding.
#[derive(Debug, Clone)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Frame::Text(text) => Some(text),
            Frame::Binary(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Frame::Text(text) => text.as_bytes(),
            Frame::Binary(data) => data,
        }
    }
}

/// A single streaming connection.
///
/// Owns the socket for exactly one session: the supervisor creates a fresh
/// `WsSession` per connection attempt and tears it down before the next one.
/// `receive` semantics: [`next_frame`](Self::next_frame) is a lazy,
/// non-restartable sequence that errors once the remote closes or the
/// transport fails; after that only [`disconnect`](Self::disconnect) is
/// meaningful.
pub struct WsSession {
    stream: Option<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    started_at: Instant,
    last_receive: Option<Instant>,
}

impl WsSession {
    /// Open the WebSocket handshake.
    pub async fn connect(url: &str) -> Result<Self> {
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| FeedError::Connection(format!("handshake failed: {e}")))?;

        Ok(Self {
            stream: Some(stream),
            started_at: Instant::now(),
            last_receive: None,
        })
    }

    /// Send one JSON payload as a text frame.
    pub async fn send_json(&mut self, payload: &Value) -> Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| FeedError::Connection("send on closed session".into()))?;

        stream
            .send(Message::Text(payload.to_string()))
            .await
            .map_err(|e| FeedError::Connection(format!("send failed: {e}")))
    }

    /// Wait for the next data frame.
    ///
    /// WebSocket-level ping/pong frames are absorbed here (tungstenite queues
    /// the pong reply itself); a close frame or transport error ends the
    /// sequence with a `Connection` error.
    pub async fn next_frame(&mut self) -> Result<Frame> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| FeedError::Connection("receive on closed session".into()))?;

        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    self.last_receive = Some(Instant::now());
                    return Ok(Frame::Text(text));
                }
                Some(Ok(Message::Binary(data))) => {
                    self.last_receive = Some(Instant::now());
                    return Ok(Frame::Binary(data));
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                    self.last_receive = Some(Instant::now());
                }
                Some(Ok(Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    return Err(FeedError::Connection(format!(
                        "closed by remote: {frame:?}"
                    )));
                }
                Some(Err(e)) => {
                    return Err(FeedError::Connection(format!("transport error: {e}")));
                }
                None => {
                    return Err(FeedError::Connection("stream ended".into()));
                }
            }
        }
    }

    /// Timestamp of the most recent inbound frame, or session start if none
    /// has arrived yet.
    pub fn last_receive_time(&self) -> Instant {
        self.last_receive.unwrap_or(self.started_at)
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Tear the connection down. Idempotent: safe to call on an
    /// already-closed or already-dead session, and close errors are ignored.
    pub async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close(None).await {
                debug!("close handshake skipped: {}", e);
            }
        }
    }
}
