//! Reconnect supervisor.
//!
//! The outermost control loop of one feed. It drives the state machine
//! `Disconnected → Connecting → Subscribing → Live` and, on any session
//! error, tears the transport down, cools down, and starts over. It never
//! gives up; the only way out is the shutdown signal, which skips the
//! cool-down and wins every race inside the live loop.

use crate::core::heartbeat::HeartbeatTimer;
use crate::core::session::{Frame, WsSession};
use crate::core::shutdown::ShutdownSignal;
use crate::core::state::{FeedHealth, FeedState, FeedStatus};
use crate::traits::error::Result;
use crate::traits::protocol::StreamProtocol;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Per-session timing knobs.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// A silent connection pings within this interval.
    pub heartbeat_interval: Duration,
    /// Wait between a session failure and the next connection attempt.
    pub reconnect_cooldown: Duration,
}

impl SessionConfig {
    pub fn new(heartbeat_interval: Duration, reconnect_cooldown: Duration) -> Self {
        Self {
            heartbeat_interval,
            reconnect_cooldown,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            reconnect_cooldown: Duration::from_secs(5),
        }
    }
}

enum Step {
    Frame(Result<Frame>),
    PingDue,
    Cancelled,
}

/// Supervises one feed's connection for the life of the process.
pub struct FeedSupervisor<P> {
    protocol: Arc<P>,
    config: SessionConfig,
    status: Arc<FeedStatus>,
    shutdown: ShutdownSignal,
}

impl<P: StreamProtocol> FeedSupervisor<P> {
    pub fn new(protocol: Arc<P>, config: SessionConfig, shutdown: ShutdownSignal) -> Self {
        Self {
            protocol,
            config,
            status: Arc::new(FeedStatus::new()),
            shutdown,
        }
    }

    /// Shared status handle for health reporting.
    pub fn status(&self) -> Arc<FeedStatus> {
        Arc::clone(&self.status)
    }

    pub fn health(&self) -> FeedHealth {
        self.status.health()
    }

    /// Run until the shutdown signal fires. Session errors are logged and
    /// retried indefinitely after the configured cool-down.
    pub async fn run(&self) {
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            match self.run_session().await {
                // A clean return means shutdown was observed inside.
                Ok(()) => break,
                Err(e) => {
                    warn!(
                        "session ended: {}; reconnecting in {:?}",
                        e, self.config.reconnect_cooldown
                    );
                }
            }

            self.status.set(FeedState::Disconnected);
            if !self.shutdown.sleep(self.config.reconnect_cooldown).await {
                break;
            }
        }

        self.status.set(FeedState::Disconnected);
        debug!("supervisor exiting");
    }

    /// One full session: connect, subscribe, live loop, teardown.
    async fn run_session(&self) -> Result<()> {
        self.status.set(FeedState::Connecting);

        // Credential fetch and handshake are suspension points too;
        // cancellation here abandons the half-open attempt, which closes
        // the socket on drop.
        let mut session = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Ok(()),
            session = self.open_session() => session?,
        };

        // Teardown happens on every exit path, error or cancellation alike.
        let result = self.drive(&mut session).await;
        session.disconnect().await;
        result
    }

    async fn open_session(&self) -> Result<WsSession> {
        let url = self.protocol.connect_url().await?;
        info!("connecting to {}", redact_query(&url));
        WsSession::connect(&url).await
    }

    async fn drive(&self, session: &mut WsSession) -> Result<()> {
        self.status.set(FeedState::Subscribing);
        for payload in self.protocol.subscriptions() {
            // Partial subscription is not a supported state: any failure
            // here aborts the session before it goes live.
            session.send_json(&payload).await?;
        }

        self.status.set(FeedState::Live);
        let mut heartbeat = HeartbeatTimer::new(self.config.heartbeat_interval);

        loop {
            let step = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => Step::Cancelled,
                frame = session.next_frame() => Step::Frame(frame),
                _ = tokio::time::sleep_until(heartbeat.deadline()) => Step::PingDue,
            };

            match step {
                Step::Cancelled => {
                    self.status.set(FeedState::Closing);
                    info!("session cancelled, closing");
                    return Ok(());
                }
                Step::Frame(frame) => {
                    let frame = frame?;
                    self.status.mark_receive(epoch_ms());
                    heartbeat.touch();
                    self.protocol.dispatch(frame)?;
                }
                Step::PingDue => {
                    debug!("link idle for {:?}, sending ping", heartbeat.idle());
                    session.send_json(&self.protocol.ping_payload()).await?;
                    heartbeat.touch();
                }
            }
        }
    }
}

fn epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Strip the query string before logging; private-stream URLs carry the
/// session credential as a query parameter.
fn redact_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}
