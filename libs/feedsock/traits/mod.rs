//! Core traits and types for the FeedSock session layer.
//!
//! - **FeedError**: the error taxonomy every component speaks
//! - **StreamProtocol**: the exchange-specific behavior injected into the
//!   generic session machinery

pub mod error;
pub mod protocol;

pub use error::{FeedError, Result};
pub use protocol::StreamProtocol;
