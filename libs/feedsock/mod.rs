//! # FeedSock
//!
//! A resilient streaming-session layer for exchange market-data and
//! account-event feeds.
//!
//! The exchange-specific pieces (URLs, subscribe payloads, frame decoding)
//! are injected through the [`StreamProtocol`] trait; everything else is
//! generic machinery:
//!
//! - **Transport session**: one WebSocket connection with idempotent
//!   teardown and last-receive tracking
//! - **Heartbeat deadline**: pings are sent only when the link goes silent,
//!   never while data is flowing
//! - **Typed routing**: one unbounded FIFO queue per message kind, reused
//!   across reconnects
//! - **Reconnect supervisor**: connect → subscribe → live → cool-down →
//!   retry, indefinitely, with cancellation honored at every suspension
//!   point
//!
//! ## Example
//!
//! ```rust,ignore
//! let shutdown = ShutdownSignal::new();
//! let supervisor = FeedSupervisor::new(
//!     Arc::new(MyProtocol::new()),
//!     SessionConfig::new(Duration::from_secs(30), Duration::from_secs(5)),
//!     shutdown.clone(),
//! );
//!
//! tokio::spawn(async move { supervisor.run().await });
//! ```

pub mod core;
pub mod traits;

pub use crate::core::heartbeat::HeartbeatTimer;
pub use crate::core::routing::RouteTable;
pub use crate::core::session::{Frame, WsSession};
pub use crate::core::shutdown::ShutdownSignal;
pub use crate::core::state::{FeedHealth, FeedState, FeedStatus};
pub use crate::core::supervisor::{FeedSupervisor, SessionConfig};
pub use crate::traits::error::{FeedError, Result};
pub use crate::traits::protocol::StreamProtocol;
