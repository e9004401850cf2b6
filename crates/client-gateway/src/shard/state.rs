//! Shard connection state
//!
//! The state machine positions a shard moves through, and the snapshot the
//! coordinator reads for health aggregation. The snapshot is written only
//! by the shard's own task; everyone else gets a read-only view.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Connection state of a single shard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShardState {
    /// Not connected, not trying to connect
    Disconnected,
    /// Transport handshake in progress
    Connecting,
    /// Fresh identify sent, waiting for READY
    Identifying,
    /// Resume sent, waiting for replay and RESUMED
    Resuming,
    /// Live session, heartbeating
    Connected,
    /// Waiting out the backoff before the next connect attempt
    Reconnecting,
    /// Reconnect budget exhausted; requires an explicit restart
    Failed,
}

impl ShardState {
    /// Check if the shard holds (or is establishing) a transport
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::Identifying | Self::Resuming | Self::Connected
        )
    }

    /// Check if the shard will make no further progress on its own
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Get the name of this state
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Identifying => "Identifying",
            Self::Resuming => "Resuming",
            Self::Connected => "Connected",
            Self::Reconnecting => "Reconnecting",
            Self::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for ShardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Published health snapshot of one shard
///
/// Written by the owning connection task, read by the coordinator.
#[derive(Debug, Clone)]
pub struct ShardStatus {
    /// Current connection state
    pub state: ShardState,

    /// Last measured heartbeat round-trip (ack - sent); None until the
    /// first full heartbeat cycle completes
    pub latency: Option<Duration>,

    /// When the last heartbeat was sent
    pub last_heartbeat_sent: Option<Instant>,

    /// When the last heartbeat ACK arrived
    pub last_heartbeat_acked: Option<Instant>,

    /// Session id of the current (or last) session
    pub session_id: Option<String>,

    /// Last received dispatch sequence number
    pub last_sequence: Option<u64>,

    /// Reconnect attempts in the current outage (zero while healthy)
    pub reconnect_attempts: u32,
}

impl ShardStatus {
    /// Snapshot for a shard that has never connected
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ShardState::Disconnected,
            latency: None,
            last_heartbeat_sent: None,
            last_heartbeat_acked: None,
            session_id: None,
            last_sequence: None,
            reconnect_attempts: 0,
        }
    }
}

impl Default for ShardStatus {
    fn default() -> Self {
        Self::new()
    }
}
