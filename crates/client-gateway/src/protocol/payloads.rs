//! Gateway payload definitions
//!
//! Payload structures carried in the `d` field of gateway messages.

use client_core::Intents;
use serde::{Deserialize, Serialize};

/// Payload for op 10 (Hello)
///
/// First message the server sends after the transport opens. The client
/// must heartbeat at the mandated interval from then on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

/// Payload for op 2 (Identify)
///
/// Starts a brand-new session. Subject to the global identify rate limit;
/// the shard field places this connection in the shard topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyPayload {
    /// Authentication token
    pub token: String,

    /// `[shard_id, shard_count]`
    pub shard: [u32; 2],

    /// Gateway event subscriptions
    pub intents: Intents,

    /// Client properties
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<IdentifyProperties>,
}

impl IdentifyPayload {
    /// Build an identify payload for one shard
    #[must_use]
    pub fn new(token: impl Into<String>, shard_id: u32, shard_count: u32, intents: Intents) -> Self {
        Self {
            token: token.into(),
            shard: [shard_id, shard_count],
            intents,
            properties: Some(IdentifyProperties::current()),
        }
    }
}

/// Client connection properties
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyProperties {
    /// Operating system
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,

    /// Library or client name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,

    /// Device type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

impl IdentifyProperties {
    /// Properties describing this process
    #[must_use]
    pub fn current() -> Self {
        Self {
            os: Some(std::env::consts::OS.to_string()),
            browser: Some("chat-client".to_string()),
            device: Some("chat-client".to_string()),
        }
    }
}

/// Payload for op 4 (Resume)
///
/// Continues a prior session from a known sequence number. Not subject to
/// the identify rate limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumePayload {
    /// Authentication token
    pub token: String,

    /// Session ID to resume
    pub session_id: String,

    /// Last received sequence number
    pub seq: u64,
}

/// Payload of the READY dispatch event
///
/// Delivered as the first Dispatch after a successful identify; the
/// session id here is what a later resume presents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyPayload {
    /// Session ID for resuming
    pub session_id: String,

    /// `[shard_id, shard_count]` echoed back by the server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shard: Option<[u32; 2]>,
}
