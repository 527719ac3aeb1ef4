//! Private-stream session credential ("listen key") lifecycle.
//!
//! The manager owns the only copy of the credential. `create` mints a fresh
//! key (the private feed calls it before every connect, so a reconnect
//! always carries a new one), `keep_alive` must be invoked by the host at
//! an interval strictly below [`constants::LISTEN_KEY_EXPIRY`], and `close`
//! invalidates the key at shutdown. The key is never logged in full.

use crate::constants;
use crate::rest::BitrueRestClient;
use chrono::{DateTime, Utc};
use feedsock::FeedError;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// The credential plus its issue time. Debug and Display render a redacted
/// prefix only.
#[derive(Clone)]
pub struct ListenKey {
    key: String,
    issued_at: DateTime<Utc>,
}

impl ListenKey {
    fn new(key: String) -> Self {
        Self {
            key,
            issued_at: Utc::now(),
        }
    }

    /// The full credential, for embedding in the connection URL.
    pub fn secret(&self) -> &str {
        &self.key
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    fn redacted(&self) -> String {
        let prefix: String = self.key.chars().take(4).collect();
        format!("{prefix}***")
    }
}

impl fmt::Debug for ListenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenKey")
            .field("key", &self.redacted())
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

impl fmt::Display for ListenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

/// Creates, renews, and closes the private stream's listen key.
pub struct ListenKeyManager {
    rest: Arc<BitrueRestClient>,
    current: RwLock<Option<ListenKey>>,
}

impl ListenKeyManager {
    pub fn new(rest: Arc<BitrueRestClient>) -> Self {
        Self {
            rest,
            current: RwLock::new(None),
        }
    }

    /// Mint a fresh credential and make it current.
    pub async fn create(&self) -> feedsock::Result<String> {
        let key = self
            .rest
            .create_listen_key()
            .await
            .map_err(|e| FeedError::Credential(format!("listen key create failed: {e}")))?;

        let listen_key = ListenKey::new(key);
        info!("listen key created ({})", listen_key);
        let secret = listen_key.secret().to_string();
        *self.current.write() = Some(listen_key);
        Ok(secret)
    }

    /// Extend the current credential's expiry window.
    ///
    /// Contract: the host must call this strictly more often than
    /// [`constants::LISTEN_KEY_EXPIRY`]; an expired key drops the stream
    /// and heals through reconnect-with-fresh-credential.
    pub async fn keep_alive(&self) -> feedsock::Result<()> {
        let secret = self
            .current
            .read()
            .as_ref()
            .map(|k| k.secret().to_string())
            .ok_or_else(|| FeedError::Credential("no active listen key to renew".into()))?;

        self.rest
            .keepalive_listen_key(&secret)
            .await
            .map_err(|e| FeedError::Credential(format!("listen key keepalive failed: {e}")))?;

        debug!(
            "listen key renewed (expiry window {:?})",
            constants::LISTEN_KEY_EXPIRY
        );
        Ok(())
    }

    /// Invalidate and drop the current credential, if any.
    pub async fn close(&self) -> feedsock::Result<()> {
        let Some(listen_key) = self.current.write().take() else {
            return Ok(());
        };

        self.rest
            .close_listen_key(listen_key.secret())
            .await
            .map_err(|e| FeedError::Credential(format!("listen key close failed: {e}")))?;

        info!("listen key closed ({})", listen_key);
        Ok(())
    }

    /// Redacted view of the current key, for health/debug output.
    pub fn current(&self) -> Option<String> {
        self.current.read().as_ref().map(|k| k.redacted())
    }
}
