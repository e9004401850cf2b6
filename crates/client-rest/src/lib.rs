//! # client-rest
//!
//! REST request pipeline with header-driven rate limiting: per-route
//! buckets discovered from responses, FIFO execution within a bucket, and
//! a global throttle across all buckets. Purely a transport concern; no
//! response bodies are cached here.

pub mod bucket;
pub mod error;
pub mod headers;
pub mod pipeline;
pub mod route;

// Re-export commonly used types at crate root
pub use bucket::{GlobalBucket, RateLimitBucket};
pub use error::{RestError, RestResult};
pub use headers::RateLimitHeaders;
pub use pipeline::RestClient;
pub use route::Route;
