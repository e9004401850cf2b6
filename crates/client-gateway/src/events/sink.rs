//! Event sink contract
//!
//! The application-facing boundary: cache update and listener dispatch
//! live behind this trait, outside the transport core.

use crate::shard::ShardState;
use async_trait::async_trait;
use serde_json::Value;

/// Receives decoded gateway events
///
/// Implementations run on the forwarder task, decoupled from connection
/// tasks, so a slow sink cannot delay heartbeat timing.
#[async_trait]
pub trait EventSink: Send + Sync + 'static {
    /// A shard changed connection state
    async fn on_connection_state_changed(&self, shard_id: u32, state: ShardState);

    /// A dispatch event arrived on a shard
    async fn on_dispatch(&self, shard_id: u32, sequence: u64, event_name: &str, payload: &Value);
}

/// Sink that logs every event
///
/// Useful as a default while wiring up an application.
#[derive(Debug, Default)]
pub struct LoggingSink;

#[async_trait]
impl EventSink for LoggingSink {
    async fn on_connection_state_changed(&self, shard_id: u32, state: ShardState) {
        tracing::info!(shard_id = shard_id, state = %state, "Shard state changed");
    }

    async fn on_dispatch(&self, shard_id: u32, sequence: u64, event_name: &str, _payload: &Value) {
        tracing::debug!(
            shard_id = shard_id,
            sequence = sequence,
            event = event_name,
            "Dispatch event"
        );
    }
}
