//! Gateway error types

use crate::protocol::CloseCode;
use thiserror::Error;

/// Gateway error type
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport-level failure (network, TLS, WebSocket handshake)
    #[error("Connection error: {0}")]
    Connection(#[from] tokio_tungstenite::tungstenite::Error),

    /// Malformed or unexpected payload
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Token rejected by the gateway
    #[error("Authentication failed")]
    Authentication,

    /// Server closed the connection with a non-recoverable code
    #[error("Gateway closed: {0}")]
    Closed(CloseCode),

    /// A shard exhausted its reconnect budget
    #[error("Shard {shard_id} failed after {attempts} reconnect attempts")]
    ShardFatal { shard_id: u32, attempts: u32 },

    /// Shard IDs outside [0, shard_count), or no shards at all
    #[error("Invalid shard configuration: {0}")]
    InvalidShardConfig(String),

    /// REST failure while fetching gateway/shard information
    #[error("Rest error: {0}")]
    Rest(#[from] client_rest::RestError),
}

impl GatewayError {
    /// Check if this error permanently stops the shard
    ///
    /// Fatal errors are surfaced instead of retried; transients are
    /// absorbed by the reconnect loop.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Authentication | Self::ShardFatal { .. } | Self::InvalidShardConfig(_) => true,
            Self::Closed(code) => !code.should_reconnect(),
            Self::Connection(_) | Self::Protocol(_) | Self::Rest(_) => false,
        }
    }
}

/// Gateway result type
pub type GatewayResult<T> = Result<T, GatewayError>;
