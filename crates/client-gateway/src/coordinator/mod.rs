//! Shard coordinator
//!
//! Owns the full set of gateway connections: creation, staggered startup,
//! health aggregation, restart, and scoped shutdown.

mod coordinator;

pub use coordinator::{GatewayBot, SessionStartLimit, ShardCoordinator};
