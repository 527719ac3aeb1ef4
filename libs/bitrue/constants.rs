//! Exchange endpoints, channel templates, and protocol timing.

use std::time::Duration;

// Base URLs
pub const REST_URL: &str = "https://openapi.bitrue.com";
pub const WSS_MARKET_URL: &str = "wss://ws.bitrue.com/market/ws";
pub const WSS_USER_URL: &str = "wss://wsapi.bitrue.com/stream";

// Market data endpoints
pub const ORDER_BOOK_PATH: &str = "/api/v1/depth";
pub const ORDER_BOOK_DEPTH_LIMIT: u32 = 1000;

// Listen key endpoints (create via POST, keepalive via PUT, close via DELETE)
pub const LISTEN_KEY_PATH: &str = "/poseidon/api/v1/listenKey";
pub const API_KEY_HEADER: &str = "X-MBX-APIKEY";

// Depth channel name template: market_<symbol>_simple_depth_step0
pub const DEPTH_CHANNEL_PREFIX: &str = "market_";
pub const DEPTH_CHANNEL_SUFFIX: &str = "_simple_depth_step0";

// User stream event type tags
pub const ORDER_UPDATE_EVENT: &str = "executionReport";
pub const BALANCE_UPDATE_EVENT: &str = "outboundAccountInfo";

// Timing
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
pub const RECONNECT_COOLDOWN: Duration = Duration::from_secs(5);
pub const SNAPSHOT_REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);
pub const REFRESH_RETRY_COOLDOWN: Duration = Duration::from_secs(5);

// The exchange expires an idle listen key after 30 minutes; hosts must call
// keepalive strictly more often than that.
pub const LISTEN_KEY_EXPIRY: Duration = Duration::from_secs(30 * 60);
pub const LISTEN_KEY_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15 * 60);
