use thiserror::Error;

/// Main error type for feedsock.
///
/// The supervisor reacts to each variant differently: `Connection` and
/// `Credential` are fatal to the current session and trigger the
/// cool-down-and-retry path, `Decode` is logged and dropped at the dispatch
/// site, and `Refresh` is confined to the snapshot-refresh loop.
#[derive(Error, Debug)]
pub enum FeedError {
    /// Transport-level failure: handshake, mid-stream close, send failure
    #[error("connection error: {0}")]
    Connection(String),

    /// Malformed or unrecognized payload; the session continues
    #[error("decode error: {0}")]
    Decode(String),

    /// Session-credential create/renew failure (private stream)
    #[error("credential error: {0}")]
    Credential(String),

    /// Full-snapshot call failed for one trading pair
    #[error("snapshot refresh failed for {pair}: {reason}")]
    Refresh { pair: String, reason: String },
}

impl FeedError {
    /// Whether this error tears down the current session.
    ///
    /// Decode and refresh failures are handled where they occur and never
    /// reach the supervisor; anything else does.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, FeedError::Connection(_) | FeedError::Credential(_))
    }
}

/// Result type for feedsock operations
pub type Result<T> = std::result::Result<T, FeedError>;
