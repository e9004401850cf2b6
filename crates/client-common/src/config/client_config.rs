//! Client configuration structs
//!
//! Loads configuration from environment variables. Only the token is
//! required; everything else has a sensible default.

use client_core::Intents;
use serde::Deserialize;
use std::env;

/// Main client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Authentication token presented on identify and REST calls
    pub token: String,
    /// Gateway event subscriptions
    pub intents: Intents,
    #[serde(default)]
    pub env: Environment,
    pub gateway: GatewayConfig,
    pub rest: RestConfig,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Gateway connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// WebSocket endpoint (ws:// or wss://)
    #[serde(default = "default_gateway_url")]
    pub url: String,

    /// Total shard count; None means ask the platform at startup
    #[serde(default)]
    pub shard_count: Option<u32>,

    /// Shard IDs owned by this process; None means all of [0, shard_count)
    #[serde(default)]
    pub shard_ids: Option<Vec<u32>>,

    /// Minimum spacing between two fresh identify handshakes
    #[serde(default = "default_identify_stagger_secs")]
    pub identify_stagger_secs: u64,

    /// Reconnect backoff policy
    #[serde(default)]
    pub reconnect: BackoffConfig,
}

/// Exponential backoff policy for reconnects
#[derive(Debug, Clone, Deserialize)]
pub struct BackoffConfig {
    #[serde(default = "default_backoff_base_ms")]
    pub base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub max_ms: u64,
    /// Attempts before the shard is declared fatally failed
    #[serde(default = "default_backoff_max_attempts")]
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: default_backoff_base_ms(),
            max_ms: default_backoff_max_ms(),
            max_attempts: default_backoff_max_attempts(),
        }
    }
}

/// REST pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RestConfig {
    /// Base URL of the REST API
    #[serde(default = "default_rest_base_url")]
    pub base_url: String,

    /// Per-call timeout in seconds
    #[serde(default = "default_rest_timeout_secs")]
    pub timeout_secs: u64,

    /// Global throttle across all buckets (requests per second)
    #[serde(default = "default_global_requests_per_second")]
    pub global_requests_per_second: u32,

    /// Retry budget for 429 and 5xx responses
    #[serde(default = "default_rest_max_retries")]
    pub max_retries: u32,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: default_rest_base_url(),
            timeout_secs: default_rest_timeout_secs(),
            global_requests_per_second: default_global_requests_per_second(),
            max_retries: default_rest_max_retries(),
        }
    }
}

// Default value functions
fn default_gateway_url() -> String {
    "wss://gateway.chat.example".to_string()
}

fn default_identify_stagger_secs() -> u64 {
    5
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    60_000
}

fn default_backoff_max_attempts() -> u32 {
    10
}

fn default_rest_base_url() -> String {
    "https://api.chat.example".to_string()
}

fn default_rest_timeout_secs() -> u64 {
    10
}

fn default_global_requests_per_second() -> u32 {
    50
}

fn default_rest_max_retries() -> u32 {
    3
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            token: env::var("CHAT_TOKEN").map_err(|_| ConfigError::MissingVar("CHAT_TOKEN"))?,
            intents: env::var("CHAT_INTENTS")
                .ok()
                .map(|s| {
                    Intents::parse(&s)
                        .map_err(|e| ConfigError::InvalidValue("CHAT_INTENTS", e.to_string()))
                })
                .transpose()?
                .unwrap_or_default(),
            env: env::var("APP_ENV")
                .ok()
                .and_then(|s| match s.to_lowercase().as_str() {
                    "production" => Some(Environment::Production),
                    "staging" => Some(Environment::Staging),
                    "development" => Some(Environment::Development),
                    _ => None,
                })
                .unwrap_or_default(),
            gateway: GatewayConfig {
                url: env::var("GATEWAY_URL").unwrap_or_else(|_| default_gateway_url()),
                shard_count: env::var("GATEWAY_SHARD_COUNT").ok().and_then(|s| s.parse().ok()),
                shard_ids: env::var("GATEWAY_SHARD_IDS")
                    .ok()
                    .map(|s| parse_shard_ids(&s))
                    .transpose()?,
                identify_stagger_secs: env::var("GATEWAY_IDENTIFY_STAGGER_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_identify_stagger_secs),
                reconnect: BackoffConfig {
                    base_ms: env::var("GATEWAY_RECONNECT_BASE_MS")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or_else(default_backoff_base_ms),
                    max_ms: env::var("GATEWAY_RECONNECT_MAX_MS")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or_else(default_backoff_max_ms),
                    max_attempts: env::var("GATEWAY_RECONNECT_MAX_ATTEMPTS")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or_else(default_backoff_max_attempts),
                },
            },
            rest: RestConfig {
                base_url: env::var("REST_BASE_URL").unwrap_or_else(|_| default_rest_base_url()),
                timeout_secs: env::var("REST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_rest_timeout_secs),
                global_requests_per_second: env::var("REST_GLOBAL_REQUESTS_PER_SECOND")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_global_requests_per_second),
                max_retries: env::var("REST_MAX_RETRIES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_rest_max_retries),
            },
        })
    }
}

/// Parse a comma-separated shard ID list ("0,1,2")
fn parse_shard_ids(s: &str) -> Result<Vec<u32>, ConfigError> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u32>()
                .map_err(|_| ConfigError::InvalidValue("GATEWAY_SHARD_IDS", part.to_string()))
        })
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
