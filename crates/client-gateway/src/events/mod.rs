//! Event boundary
//!
//! Connection tasks emit typed messages onto a channel; a forwarder task
//! drains them into the application's [`EventSink`]. Sink implementations
//! therefore never re-enter connection state.

mod sink;

pub use sink::{EventSink, LoggingSink};

use crate::shard::ShardState;
use serde_json::Value;

/// Typed message emitted by a gateway connection
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// A shard moved to a new connection state
    StateChanged {
        shard_id: u32,
        state: ShardState,
    },

    /// A dispatch event arrived, forwarded verbatim
    Dispatch {
        shard_id: u32,
        sequence: u64,
        event_name: String,
        data: Value,
    },
}

impl GatewayEvent {
    /// The shard this event originated from
    #[must_use]
    pub fn shard_id(&self) -> u32 {
        match self {
            Self::StateChanged { shard_id, .. } | Self::Dispatch { shard_id, .. } => *shard_id,
        }
    }
}
