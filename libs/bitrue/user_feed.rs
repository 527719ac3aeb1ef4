//! Private user stream: order and balance events.
//!
//! The session is authorized by a listen key embedded in the connection
//! URL. A fresh key is minted before every connect, so an expired key
//! (which surfaces as a dropped or rejected stream) heals through the
//! normal reconnect path. Renewal is the host's duty via
//! [`UserStreamFeed::keep_alive`].

use crate::constants;
use crate::decoder::decode_user_frame;
use crate::events::{AccountEvent, AccountEventKind};
use crate::listen_key::ListenKeyManager;
use crate::rest::BitrueRestClient;
use async_trait::async_trait;
use feedsock::{
    FeedHealth, FeedSupervisor, Frame, Result, RouteTable, SessionConfig, ShutdownSignal,
    StreamProtocol,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

struct UserStreamProtocol {
    url: String,
    listen_key: Arc<ListenKeyManager>,
    routes: RouteTable<AccountEventKind, AccountEvent>,
    ping_seq: AtomicU64,
}

#[async_trait]
impl StreamProtocol for UserStreamProtocol {
    async fn connect_url(&self) -> Result<String> {
        // Fresh credential per connection attempt.
        let key = self.listen_key.create().await?;
        Ok(format!("{}?listenKey={}", self.url, key))
    }

    fn subscriptions(&self) -> Vec<Value> {
        // The listen key in the URL authorizes the stream; there is
        // nothing to subscribe to.
        Vec::new()
    }

    fn ping_payload(&self) -> Value {
        let id = self.ping_seq.fetch_add(1, Ordering::Relaxed) + 1;
        json!({"id": id, "type": "ping"})
    }

    fn dispatch(&self, frame: Frame) -> Result<()> {
        match decode_user_frame(&frame) {
            Ok(events) => {
                for event in events {
                    let kind = event.kind;
                    self.routes.route(&kind, event);
                }
                Ok(())
            }
            Err(e) if e.is_session_fatal() => Err(e),
            Err(e) => {
                warn!("dropping undecodable user frame: {}", e);
                Ok(())
            }
        }
    }
}

async fn forward_account_events(
    mut rx: mpsc::UnboundedReceiver<AccountEvent>,
    out: mpsc::UnboundedSender<AccountEvent>,
    shutdown: ShutdownSignal,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return,
            event = rx.recv() => match event {
                Some(event) => event,
                None => return,
            },
        };
        if out.send(event).is_err() {
            return;
        }
    }
}

/// Private account-event feed.
pub struct UserStreamFeed {
    listen_key: Arc<ListenKeyManager>,
    supervisor: FeedSupervisor<UserStreamProtocol>,
    shutdown: ShutdownSignal,
    events_tx: mpsc::UnboundedSender<AccountEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<AccountEvent>>,
    order_rx: Option<mpsc::UnboundedReceiver<AccountEvent>>,
    balance_rx: Option<mpsc::UnboundedReceiver<AccountEvent>>,
}

impl UserStreamFeed {
    pub fn new(rest: Arc<BitrueRestClient>, shutdown: ShutdownSignal) -> Self {
        Self::with_config(
            rest,
            shutdown,
            constants::WSS_USER_URL,
            SessionConfig::new(constants::HEARTBEAT_INTERVAL, constants::RECONNECT_COOLDOWN),
        )
    }

    pub fn with_config(
        rest: Arc<BitrueRestClient>,
        shutdown: ShutdownSignal,
        url: &str,
        config: SessionConfig,
    ) -> Self {
        let listen_key = Arc::new(ListenKeyManager::new(rest));

        let mut routes = RouteTable::new();
        let order_rx = routes.register(AccountEventKind::OrderUpdate);
        let balance_rx = routes.register(AccountEventKind::BalanceUpdate);

        let protocol = Arc::new(UserStreamProtocol {
            url: url.to_string(),
            listen_key: Arc::clone(&listen_key),
            routes,
            ping_seq: AtomicU64::new(0),
        });
        let supervisor = FeedSupervisor::new(protocol, config, shutdown.clone());
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            listen_key,
            supervisor,
            shutdown,
            events_tx,
            events_rx: Some(events_rx),
            order_rx: Some(order_rx),
            balance_rx: Some(balance_rx),
        }
    }

    /// The downstream event stream. Single consumer; `None` once taken.
    pub fn events(&mut self) -> Option<mpsc::UnboundedReceiver<AccountEvent>> {
        self.events_rx.take()
    }

    pub fn health(&self) -> FeedHealth {
        self.supervisor.health()
    }

    /// Handle to the credential manager, for hosts that schedule keepalive
    /// or close the key after the feed task has been moved away.
    pub fn listen_key(&self) -> Arc<ListenKeyManager> {
        Arc::clone(&self.listen_key)
    }

    /// Renew the listen key. The host must call this strictly more often
    /// than the exchange's 30-minute expiry window.
    pub async fn keep_alive(&self) -> Result<()> {
        self.listen_key.keep_alive().await
    }

    /// Invalidate the listen key, typically at shutdown.
    pub async fn close_listen_key(&self) -> Result<()> {
        self.listen_key.close().await
    }

    /// Drive the feed until shutdown.
    pub async fn run(&mut self) {
        let (Some(order_rx), Some(balance_rx)) = (self.order_rx.take(), self.balance_rx.take())
        else {
            warn!("user stream feed is already running");
            return;
        };

        tokio::join!(
            self.supervisor.run(),
            forward_account_events(order_rx, self.events_tx.clone(), self.shutdown.clone()),
            forward_account_events(balance_rx, self.events_tx.clone(), self.shutdown.clone()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_protocol() -> UserStreamProtocol {
        let rest = Arc::new(BitrueRestClient::with_base_url(
            "http://127.0.0.1:0",
            "test-key",
        ));
        UserStreamProtocol {
            url: constants::WSS_USER_URL.to_string(),
            listen_key: Arc::new(ListenKeyManager::new(rest)),
            routes: RouteTable::new(),
            ping_seq: AtomicU64::new(0),
        }
    }

    #[test]
    fn ping_ids_are_monotonically_increasing() {
        let protocol = test_protocol();
        let first = protocol.ping_payload();
        let second = protocol.ping_payload();
        assert_eq!(first["type"], "ping");
        assert!(second["id"].as_u64().unwrap() > first["id"].as_u64().unwrap());
    }

    #[tokio::test]
    async fn fatal_dispatch_errors_propagate_but_decode_errors_do_not() {
        let protocol = test_protocol();

        let err = protocol
            .dispatch(Frame::Text(r#"{"auth":"fail"}"#.into()))
            .unwrap_err();
        assert!(err.is_session_fatal());

        protocol
            .dispatch(Frame::Text("not json at all".into()))
            .expect("decode failures are swallowed");
    }

    #[tokio::test]
    async fn dispatched_events_reach_their_kind_queue_in_order() {
        let mut routes = RouteTable::new();
        let mut order_rx = routes.register(AccountEventKind::OrderUpdate);
        let mut balance_rx = routes.register(AccountEventKind::BalanceUpdate);

        let rest = Arc::new(BitrueRestClient::with_base_url(
            "http://127.0.0.1:0",
            "test-key",
        ));
        let protocol = UserStreamProtocol {
            url: constants::WSS_USER_URL.to_string(),
            listen_key: Arc::new(ListenKeyManager::new(rest)),
            routes,
            ping_seq: AtomicU64::new(0),
        };

        let raw = r#"[
            {"e":"executionReport","i":1},
            {"e":"outboundAccountInfo","u":1},
            {"e":"executionReport","i":2}
        ]"#;
        protocol.dispatch(Frame::Text(raw.into())).unwrap();

        let first = order_rx.recv().await.unwrap();
        let second = order_rx.recv().await.unwrap();
        assert_eq!(first.payload["i"], 1);
        assert_eq!(second.payload["i"], 2);

        let balance = balance_rx.recv().await.unwrap();
        assert_eq!(balance.kind, AccountEventKind::BalanceUpdate);
    }
}
