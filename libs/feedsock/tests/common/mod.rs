//! Common test utilities for FeedSock integration tests.
//!
//! Provides a scriptable mock WebSocket server: tests can inject frames
//! into the active connection, force-drop it to simulate transport
//! failures, and inspect every frame the client sent.

use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex, Notify};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Frame received from the client, tagged with the connection it arrived on.
#[derive(Debug, Clone)]
pub struct ClientFrame {
    pub connection: usize,
    pub text: String,
}

enum ServerCmd {
    SendText(String),
    SendBinary(Vec<u8>),
    Drop,
}

pub struct MockWsServer {
    addr: SocketAddr,
    inbound_rx: mpsc::UnboundedReceiver<ClientFrame>,
    active_cmd: Arc<Mutex<Option<mpsc::UnboundedSender<ServerCmd>>>>,
    connections: Arc<AtomicUsize>,
    shutdown: Arc<Notify>,
}

impl MockWsServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let active_cmd: Arc<Mutex<Option<mpsc::UnboundedSender<ServerCmd>>>> =
            Arc::new(Mutex::new(None));
        let connections = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(Notify::new());

        let accept_cmd = Arc::clone(&active_cmd);
        let accept_connections = Arc::clone(&connections);
        let accept_shutdown = Arc::clone(&shutdown);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        let Ok((stream, _)) = result else { break };
                        let id = accept_connections.fetch_add(1, Ordering::SeqCst) + 1;
                        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
                        *accept_cmd.lock().await = Some(cmd_tx);
                        let inbound = inbound_tx.clone();
                        tokio::spawn(async move {
                            Self::handle_connection(stream, id, inbound, cmd_rx).await;
                        });
                    }
                    _ = accept_shutdown.notified() => break,
                }
            }
        });

        Self {
            addr,
            inbound_rx,
            active_cmd,
            connections,
            shutdown,
        }
    }

    async fn handle_connection(
        stream: TcpStream,
        id: usize,
        inbound: mpsc::UnboundedSender<ClientFrame>,
        mut cmd_rx: mpsc::UnboundedReceiver<ServerCmd>,
    ) {
        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(_) => return,
        };
        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let _ = inbound.send(ClientFrame { connection: id, text });
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    }
                }
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(ServerCmd::SendText(text)) => {
                            if write.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Some(ServerCmd::SendBinary(data)) => {
                            if write.send(Message::Binary(data)).await.is_err() {
                                break;
                            }
                        }
                        // Drop without a close handshake, like a dying link.
                        Some(ServerCmd::Drop) | None => break,
                    }
                }
            }
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Number of connections accepted so far.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Send a text frame to the most recent connection.
    pub async fn send_text(&self, text: impl Into<String>) {
        if let Some(tx) = self.active_cmd.lock().await.as_ref() {
            let _ = tx.send(ServerCmd::SendText(text.into()));
        }
    }

    /// Send a binary frame to the most recent connection.
    pub async fn send_binary(&self, data: Vec<u8>) {
        if let Some(tx) = self.active_cmd.lock().await.as_ref() {
            let _ = tx.send(ServerCmd::SendBinary(data));
        }
    }

    /// Kill the most recent connection without a close handshake.
    pub async fn drop_connection(&self) {
        if let Some(tx) = self.active_cmd.lock().await.as_ref() {
            let _ = tx.send(ServerCmd::Drop);
        }
    }

    /// Next frame the client sent, if any arrives within the timeout.
    pub async fn recv_client_frame(
        &mut self,
        timeout: std::time::Duration,
    ) -> Option<ClientFrame> {
        tokio::time::timeout(timeout, self.inbound_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Drain every client frame that arrives within the window.
    pub async fn drain_client_frames(
        &mut self,
        window: std::time::Duration,
    ) -> Vec<ClientFrame> {
        let mut frames = Vec::new();
        let deadline = tokio::time::Instant::now() + window;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, self.inbound_rx.recv()).await {
                Ok(Some(frame)) => frames.push(frame),
                Ok(None) | Err(_) => break,
            }
        }
        frames
    }
}

impl Drop for MockWsServer {
    fn drop(&mut self) {
        self.shutdown.notify_waiters();
    }
}
