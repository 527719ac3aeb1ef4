//! Generic session machinery: transport, heartbeat, routing, state,
//! shutdown, and the reconnect supervisor that ties them together.

pub mod heartbeat;
pub mod routing;
pub mod session;
pub mod shutdown;
pub mod state;
pub mod supervisor;

pub use heartbeat::HeartbeatTimer;
pub use routing::RouteTable;
pub use session::{Frame, WsSession};
pub use shutdown::ShutdownSignal;
pub use state::{FeedHealth, FeedState, FeedStatus};
pub use supervisor::{FeedSupervisor, SessionConfig};
