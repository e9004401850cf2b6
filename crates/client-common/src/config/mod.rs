//! Configuration loading

mod client_config;

pub use client_config::{
    BackoffConfig, ClientConfig, ConfigError, Environment, GatewayConfig, RestConfig,
};
