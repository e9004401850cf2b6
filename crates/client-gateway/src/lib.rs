//! # client-gateway
//!
//! Client-side gateway runtime: per-shard WebSocket connection state
//! machines and the coordinator that owns them.

pub mod coordinator;
pub mod error;
pub mod events;
pub mod protocol;
pub mod shard;

// Re-export commonly used types at crate root
pub use coordinator::{GatewayBot, SessionStartLimit, ShardCoordinator};
pub use error::{GatewayError, GatewayResult};
pub use events::{EventSink, GatewayEvent, LoggingSink};
pub use shard::{Backoff, GatewayConnection, IdentifyThrottle, Session, ShardState, ShardStatus};
