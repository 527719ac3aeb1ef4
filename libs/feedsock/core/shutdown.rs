//! Graceful shutdown signal.
//!
//! A clone-able handle whose `cancelled()` future can sit in any `select!`
//! arm, so every suspension point (frame wait, heartbeat deadline, queue
//! pop, REST call, reconnect cool-down) reacts to shutdown immediately
//! instead of on the next poll.

use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

/// Shared cancellation signal for one process.
#[derive(Clone)]
pub struct ShutdownSignal {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx, rx }
    }

    /// Trigger shutdown. Every clone observes it.
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown has been triggered. Resolves immediately if it
    /// already was.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        // Only errors if the sender is gone, which we treat as shutdown.
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
    }

    /// Spawn a Ctrl+C handler that triggers this signal.
    pub fn spawn_signal_handler(&self) {
        let this = self.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                info!("received shutdown signal (Ctrl+C), shutting down gracefully");
                this.trigger();
            }
        });
    }

    /// Sleep for `duration`, waking early on shutdown.
    ///
    /// Returns `true` if the full duration elapsed, `false` if shutdown cut
    /// it short.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.cancelled() => false,
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}
