//! Bitrue feed bot - main library
//!
//! Re-exports the workspace libraries:
//!
//! - **feedsock**: resilient streaming-session layer (transport, heartbeat,
//!   routing, reconnect supervision)
//! - **bitrue**: the Bitrue connector (order book feed, user stream feed,
//!   REST client, listen-key management)

pub use bitrue;
pub use feedsock;
