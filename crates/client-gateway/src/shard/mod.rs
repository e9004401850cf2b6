//! Per-shard gateway connection
//!
//! One shard owns one WebSocket session: connect, identify or resume,
//! heartbeat, dispatch, reconnect with backoff.

mod backoff;
mod connection;
mod session;
mod state;
mod throttle;

pub use backoff::Backoff;
pub use connection::GatewayConnection;
pub use session::Session;
pub use state::{ShardState, ShardStatus};
pub use throttle::IdentifyThrottle;
