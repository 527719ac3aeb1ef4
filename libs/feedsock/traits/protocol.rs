use crate::core::session::Frame;
use crate::traits::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Exchange-specific behavior of one streaming feed.
///
/// The [`FeedSupervisor`](crate::core::supervisor::FeedSupervisor) owns the
/// connection lifecycle and calls into this trait at four points:
///
/// 1. `connect_url` before each connection attempt; private feeds mint
///    their session credential here, so every reconnect gets a fresh one
/// 2. `subscriptions` right after the handshake, sent before the session
///    is considered live; a send failure is fatal
/// 3. `ping_payload` when the heartbeat deadline fires
/// 4. `dispatch` for every inbound data frame
///
/// Implementations route decoded messages into their own queues; decode
/// failures are logged and swallowed inside `dispatch` so a malformed frame
/// never tears the session down. Returning an error from `dispatch` is
/// reserved for conditions that must force a reconnect (e.g. the server
/// rejecting the session's credential mid-stream).
#[async_trait]
pub trait StreamProtocol: Send + Sync + 'static {
    /// URL for the next connection attempt.
    async fn connect_url(&self) -> Result<String>;

    /// Subscribe payloads, one per configured channel, sent in order after
    /// every successful connect.
    fn subscriptions(&self) -> Vec<Value>;

    /// Keep-alive payload sent when the heartbeat deadline expires.
    fn ping_payload(&self) -> Value;

    /// Decode and route one inbound frame.
    fn dispatch(&self, frame: Frame) -> Result<()>;
}
