//! # Bitrue connector
//!
//! Resilient market-data and account-event feeds for the Bitrue exchange,
//! built on the generic session machinery in `feedsock`.
//!
//! Two feeds are exposed:
//!
//! - [`OrderBookFeed`]: public depth channel. Emits an ordered stream of
//!   [`OrderBookEvent`]s combining streaming snapshots, incremental diffs,
//!   trades, and hourly full-book REST refreshes.
//! - [`UserStreamFeed`]: private account channel, authorized by a
//!   listen-key credential. Emits [`AccountEvent`]s (order updates, balance
//!   updates) verbatim.
//!
//! Both feeds reconnect forever, heartbeat when idle, and honor a shared
//! shutdown signal.

pub mod constants;
pub mod decoder;
pub mod events;
pub mod listen_key;
pub mod market_feed;
pub mod rest;
pub mod symbols;
pub mod user_feed;
pub mod wire;

pub use decoder::{MarketChannel, MarketMessage};
pub use events::{AccountEvent, AccountEventKind, OrderBookEvent, PriceLevel, TradeSide};
pub use listen_key::{ListenKey, ListenKeyManager};
pub use market_feed::{OrderBookFeed, RestSnapshotSource, SnapshotRefresher, SnapshotSource};
pub use rest::{BitrueRestClient, RestError};
pub use symbols::SymbolMap;
pub use user_feed::UserStreamFeed;
