//! Rate-limit header parsing
//!
//! The server describes each bucket in its response headers; a missing or
//! malformed header leaves the corresponding field unknown rather than
//! failing the request.

use reqwest::header::HeaderMap;
use std::time::Duration;

/// `X-RateLimit-Limit`: max calls per window
pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
/// `X-RateLimit-Remaining`: calls left in the current window
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
/// `X-RateLimit-Reset-After`: seconds until the window resets
pub const HEADER_RESET_AFTER: &str = "x-ratelimit-reset-after";
/// `X-RateLimit-Bucket`: server-side bucket identity hint
pub const HEADER_BUCKET: &str = "x-ratelimit-bucket";
/// `Retry-After`: seconds to wait after a 429
pub const HEADER_RETRY_AFTER: &str = "retry-after";

/// Rate-limit fields extracted from one response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitHeaders {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub reset_after: Option<Duration>,
    pub bucket: Option<String>,
    pub retry_after: Option<Duration>,
}

impl RateLimitHeaders {
    /// Parse rate-limit fields out of a response header map
    #[must_use]
    pub fn parse(headers: &HeaderMap) -> Self {
        Self {
            limit: header_value(headers, HEADER_LIMIT),
            remaining: header_value(headers, HEADER_REMAINING),
            reset_after: header_value::<f64>(headers, HEADER_RESET_AFTER)
                .filter(|s| s.is_finite() && *s >= 0.0)
                .map(Duration::from_secs_f64),
            bucket: headers
                .get(HEADER_BUCKET)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            retry_after: header_value::<f64>(headers, HEADER_RETRY_AFTER)
                .filter(|s| s.is_finite() && *s >= 0.0)
                .map(Duration::from_secs_f64),
        }
    }

    /// Check if any bucket-describing field was present
    #[must_use]
    pub fn describes_bucket(&self) -> bool {
        self.limit.is_some() || self.remaining.is_some() || self.reset_after.is_some()
    }
}

fn header_value<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}
