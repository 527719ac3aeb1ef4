//! Integration tests for the session layer: heartbeat timing, reconnect
//! behavior, subscription replay, cancellation, and transport teardown.

mod common;

use async_trait::async_trait;
use common::MockWsServer;
use feedsock::{
    FeedError, FeedState, FeedSupervisor, Frame, Result, SessionConfig, ShutdownSignal,
    StreamProtocol, WsSession,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

struct TestProtocol {
    url: String,
    pairs: Vec<String>,
    dispatched: mpsc::UnboundedSender<String>,
}

impl TestProtocol {
    fn new(url: String, pairs: &[&str]) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let protocol = Self {
            url,
            pairs: pairs.iter().map(|p| p.to_string()).collect(),
            dispatched: tx,
        };
        (protocol, rx)
    }
}

#[async_trait]
impl StreamProtocol for TestProtocol {
    async fn connect_url(&self) -> Result<String> {
        Ok(self.url.clone())
    }

    fn subscriptions(&self) -> Vec<Value> {
        self.pairs
            .iter()
            .map(|pair| json!({"event": "sub", "params": {"channel": format!("depth:{pair}")}}))
            .collect()
    }

    fn ping_payload(&self) -> Value {
        json!({"ping": 1})
    }

    fn dispatch(&self, frame: Frame) -> Result<()> {
        if let Some(text) = frame.as_text() {
            let _ = self.dispatched.send(text.to_string());
        }
        Ok(())
    }
}

fn spawn_supervisor(
    protocol: TestProtocol,
    config: SessionConfig,
    shutdown: &ShutdownSignal,
) -> (Arc<FeedSupervisor<TestProtocol>>, tokio::task::JoinHandle<()>) {
    let supervisor = Arc::new(FeedSupervisor::new(
        Arc::new(protocol),
        config,
        shutdown.clone(),
    ));
    let runner = Arc::clone(&supervisor);
    let handle = tokio::spawn(async move { runner.run().await });
    (supervisor, handle)
}

fn is_ping(frame: &str) -> bool {
    frame.contains("\"ping\"")
}

#[tokio::test]
async fn goes_live_and_dispatches_in_arrival_order() {
    let mut server = MockWsServer::start().await;
    let (protocol, mut dispatched) = TestProtocol::new(server.ws_url(), &["BTC-USDT"]);
    let shutdown = ShutdownSignal::new();
    let config = SessionConfig::new(Duration::from_secs(30), Duration::from_millis(50));
    let (supervisor, handle) = spawn_supervisor(protocol, config, &shutdown);

    // Subscribe frame arrives before anything else.
    let first = server
        .recv_client_frame(Duration::from_secs(2))
        .await
        .expect("subscribe frame");
    assert!(first.text.contains("depth:BTC-USDT"));

    // Live follows immediately after the subscribe frames go out.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(supervisor.health().state, FeedState::Live);

    for n in 0..10 {
        server.send_text(format!("{{\"seq\":{n}}}")).await;
    }
    for n in 0..10 {
        let frame = tokio::time::timeout(Duration::from_secs(2), dispatched.recv())
            .await
            .expect("dispatch within deadline")
            .expect("dispatch channel open");
        assert_eq!(frame, format!("{{\"seq\":{n}}}"));
    }

    shutdown.trigger();
    handle.await.unwrap();
    assert_eq!(supervisor.health().state, FeedState::Disconnected);
}

#[tokio::test]
async fn silent_link_pings_exactly_once_per_interval() {
    let mut server = MockWsServer::start().await;
    let (protocol, _dispatched) = TestProtocol::new(server.ws_url(), &["BTC-USDT"]);
    let shutdown = ShutdownSignal::new();
    let config = SessionConfig::new(Duration::from_millis(400), Duration::from_millis(50));
    let (_supervisor, handle) = spawn_supervisor(protocol, config, &shutdown);

    // Let the subscribe frame through first.
    let subs = server.drain_client_frames(Duration::from_millis(100)).await;
    assert!(subs.iter().all(|f| !is_ping(&f.text)));

    // Stay silent for a bit over one interval: exactly one ping is due.
    let frames = server.drain_client_frames(Duration::from_millis(500)).await;
    let pings: Vec<_> = frames.iter().filter(|f| is_ping(&f.text)).collect();
    assert_eq!(pings.len(), 1, "expected exactly one ping, got {frames:?}");

    shutdown.trigger();
    handle.await.unwrap();
}

#[tokio::test]
async fn active_link_never_pings() {
    let mut server = MockWsServer::start().await;
    let (protocol, _dispatched) = TestProtocol::new(server.ws_url(), &["BTC-USDT"]);
    let shutdown = ShutdownSignal::new();
    let config = SessionConfig::new(Duration::from_millis(400), Duration::from_millis(50));
    let (_supervisor, handle) = spawn_supervisor(protocol, config, &shutdown);

    server.drain_client_frames(Duration::from_millis(100)).await;

    // Feed frames faster than the heartbeat interval for three intervals.
    let mut received = Vec::new();
    for n in 0..12 {
        server.send_text(format!("{{\"seq\":{n}}}")).await;
        received.extend(server.drain_client_frames(Duration::from_millis(100)).await);
    }

    assert!(
        received.iter().all(|f| !is_ping(&f.text)),
        "no ping should be sent while data is flowing: {received:?}"
    );

    shutdown.trigger();
    handle.await.unwrap();
}

#[tokio::test]
async fn reconnect_resubscribes_every_pair_once() {
    let mut server = MockWsServer::start().await;
    let (protocol, _dispatched) =
        TestProtocol::new(server.ws_url(), &["BTC-USDT", "ETH-USDT"]);
    let shutdown = ShutdownSignal::new();
    let config = SessionConfig::new(Duration::from_secs(30), Duration::from_millis(100));
    let (supervisor, handle) = spawn_supervisor(protocol, config, &shutdown);

    let first_subs = server.drain_client_frames(Duration::from_millis(300)).await;
    assert_eq!(first_subs.len(), 2);
    assert!(first_subs.iter().all(|f| f.connection == 1));

    // Simulate a mid-session transport failure.
    server.drop_connection().await;

    // After the cool-down a fresh session re-issues every subscription,
    // exactly once per pair, before anything else.
    let second_subs = server.drain_client_frames(Duration::from_secs(2)).await;
    let on_second: Vec<_> = second_subs.iter().filter(|f| f.connection == 2).collect();
    assert_eq!(on_second.len(), 2, "resubscribe frames: {second_subs:?}");
    assert!(on_second.iter().any(|f| f.text.contains("depth:BTC-USDT")));
    assert!(on_second.iter().any(|f| f.text.contains("depth:ETH-USDT")));
    assert_eq!(server.connection_count(), 2);
    assert_eq!(supervisor.health().state, FeedState::Live);

    shutdown.trigger();
    handle.await.unwrap();
}

#[tokio::test]
async fn shutdown_cuts_reconnect_cooldown_short() {
    // Nothing listens on this port, so the supervisor sits in its
    // connect/cool-down cycle until cancelled.
    let (protocol, _dispatched) =
        TestProtocol::new("ws://127.0.0.1:9".to_string(), &["BTC-USDT"]);
    let shutdown = ShutdownSignal::new();
    let config = SessionConfig::new(Duration::from_secs(30), Duration::from_secs(60));
    let (_supervisor, handle) = spawn_supervisor(protocol, config, &shutdown);

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown.trigger();

    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("supervisor exits without waiting out the cool-down")
        .unwrap();
}

#[tokio::test]
async fn disconnect_is_idempotent() {
    let server = MockWsServer::start().await;
    let mut session = WsSession::connect(&server.ws_url()).await.unwrap();
    assert!(session.is_connected());

    session.disconnect().await;
    assert!(!session.is_connected());
    // Second teardown is a no-op, not an error.
    session.disconnect().await;

    let err = session.send_json(&json!({"ping": 1})).await.unwrap_err();
    assert!(matches!(err, FeedError::Connection(_)));
}

#[tokio::test]
async fn last_receive_time_starts_at_session_start() {
    let server = MockWsServer::start().await;
    let mut session = WsSession::connect(&server.ws_url()).await.unwrap();

    let at_start = session.last_receive_time();
    server.send_text("{\"seq\":1}").await;
    let frame = session.next_frame().await.unwrap();
    assert_eq!(frame.as_text(), Some("{\"seq\":1}"));
    assert!(session.last_receive_time() >= at_start);

    session.disconnect().await;
}
