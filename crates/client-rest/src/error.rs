//! REST error types

use thiserror::Error;

/// REST pipeline error type
#[derive(Debug, Error)]
pub enum RestError {
    /// Transport-level failure (connection, TLS, timeout)
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Token rejected (401)
    #[error("Authentication failed")]
    Authentication,

    /// Retry budget exhausted against a rate-limited bucket
    #[error("Rate limit retry budget exhausted for bucket {bucket}")]
    RateLimitExceeded { bucket: String },

    /// Non-retryable client error (4xx other than 401/429)
    #[error("Request failed with status {status}")]
    ClientRequest {
        status: u16,
        body: serde_json::Value,
    },

    /// Server error persisted through the retry budget
    #[error("Server error {status} after {attempts} attempts")]
    ServerError { status: u16, attempts: u32 },

    /// Response body did not match the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RestError {
    /// Check if the caller could meaningfully retry this error later
    ///
    /// Authentication and malformed-request failures will fail the same
    /// way every time; budget exhaustion may clear up.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::RateLimitExceeded { .. } | Self::ServerError { .. }
        )
    }
}

/// REST result type
pub type RestResult<T> = Result<T, RestError>;
