//! # client-common
//!
//! Shared utilities for the client runtime: configuration loading and
//! telemetry setup.

pub mod config;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{
    BackoffConfig, ClientConfig, ConfigError, Environment, GatewayConfig, RestConfig,
};
pub use telemetry::{init_tracing, try_init_tracing, TracingConfig, TracingError};
