//! REST request pipeline
//!
//! Every call passes its route bucket and the global bucket before going
//! on the wire. The route bucket's mutex is held for the whole request, so
//! same-bucket calls execute in FIFO submission order and header updates
//! are single-writer; different buckets proceed concurrently.

use crate::bucket::{GlobalBucket, RateLimitBucket};
use crate::error::{RestError, RestResult};
use crate::headers::RateLimitHeaders;
use crate::route::Route;
use client_common::RestConfig;
use dashmap::DashMap;
use reqwest::{header, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Fallback wait when a 429 arrives without a Retry-After header
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Base delay for 5xx retries
const SERVER_ERROR_BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Cap for 5xx retry delays
const SERVER_ERROR_BACKOFF_MAX: Duration = Duration::from_secs(15);

/// Rate-limit-aware REST client
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    buckets: DashMap<String, Arc<Mutex<RateLimitBucket>>>,
    global: Mutex<GlobalBucket>,
    max_retries: u32,
}

impl RestClient {
    /// Create a client from the REST configuration
    pub fn new(config: &RestConfig, token: impl Into<String>) -> RestResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            buckets: DashMap::new(),
            global: Mutex::new(GlobalBucket::new(config.global_requests_per_second)),
            max_retries: config.max_retries,
        })
    }

    /// Execute a request and return the decoded JSON body
    ///
    /// Blocks (suspends) while the route bucket or the global bucket is
    /// exhausted; retries 429 per the server's Retry-After and 5xx with
    /// capped exponential backoff, up to the configured budget.
    pub async fn request(&self, route: &Route, body: Option<&Value>) -> RestResult<Value> {
        let bucket = self
            .buckets
            .entry(route.bucket_key().to_string())
            .or_insert_with(|| Arc::new(Mutex::new(RateLimitBucket::new(route.bucket_key()))))
            .clone();

        // FIFO within the bucket: tokio's mutex queues waiters fairly
        let mut bucket = bucket.lock().await;

        if let Some(wait) = bucket.wait_duration(Instant::now()) {
            tracing::debug!(
                bucket = bucket.key(),
                wait_ms = wait.as_millis() as u64,
                "Bucket exhausted, waiting for reset"
            );
            tokio::time::sleep(wait).await;
            // Crossing the reset boundary reopens the window
            let _ = bucket.wait_duration(Instant::now());
        }
        bucket.claim();

        let url = format!("{}{}", self.base_url, route.path());
        let mut rate_limit_attempts = 0u32;
        let mut server_error_attempts = 0u32;

        loop {
            self.acquire_global().await;

            let mut request = self
                .http
                .request(route.method().clone(), &url)
                .header(header::AUTHORIZATION, format!("Bearer {}", self.token));
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;

            let headers = RateLimitHeaders::parse(response.headers());
            bucket.update(&headers, Instant::now());

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                rate_limit_attempts += 1;
                if rate_limit_attempts > self.max_retries {
                    return Err(RestError::RateLimitExceeded {
                        bucket: route.bucket_key().to_string(),
                    });
                }
                let retry_after = headers.retry_after.unwrap_or(DEFAULT_RETRY_AFTER);
                tracing::warn!(
                    bucket = bucket.key(),
                    retry_after_ms = retry_after.as_millis() as u64,
                    attempt = rate_limit_attempts,
                    "Rate limited, sleeping for server-specified delay"
                );
                tokio::time::sleep(retry_after).await;
                continue;
            }

            if status.is_server_error() {
                server_error_attempts += 1;
                if server_error_attempts > self.max_retries {
                    return Err(RestError::ServerError {
                        status: status.as_u16(),
                        attempts: server_error_attempts,
                    });
                }
                let delay = SERVER_ERROR_BACKOFF_BASE
                    .saturating_mul(1u32 << (server_error_attempts - 1).min(16))
                    .min(SERVER_ERROR_BACKOFF_MAX);
                tracing::warn!(
                    route = %route,
                    status = status.as_u16(),
                    delay_ms = delay.as_millis() as u64,
                    "Server error, retrying with backoff"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if status == StatusCode::UNAUTHORIZED {
                return Err(RestError::Authentication);
            }

            if status.is_client_error() {
                let body = read_json_body(response).await;
                return Err(RestError::ClientRequest {
                    status: status.as_u16(),
                    body,
                });
            }

            if status == StatusCode::NO_CONTENT {
                return Ok(Value::Null);
            }
            return Ok(response.json::<Value>().await?);
        }
    }

    /// Execute a request and deserialize the body into a typed value
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        route: &Route,
        body: Option<&Value>,
    ) -> RestResult<T> {
        let value = self.request(route, body).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Take a slot from the global bucket, sleeping through exhausted windows
    async fn acquire_global(&self) {
        loop {
            let delay = self.global.lock().await.acquire_delay(Instant::now());
            match delay {
                None => return,
                Some(delay) => {
                    tracing::trace!(
                        delay_ms = delay.as_millis() as u64,
                        "Global bucket exhausted, waiting"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Number of buckets discovered so far
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

/// Best-effort decode of an error body; non-JSON bodies become strings
async fn read_json_body(response: reqwest::Response) -> Value {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url)
            .field("buckets", &self.buckets.len())
            .finish()
    }
}
