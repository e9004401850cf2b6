//! Gateway client entry point
//!
//! Run with:
//! ```bash
//! cargo run -p client-gateway
//! ```
//!
//! Configuration is loaded from environment variables.

use client_common::{try_init_tracing, ClientConfig, TracingConfig};
use client_gateway::{LoggingSink, ShardCoordinator};
use client_rest::RestClient;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Initialize tracing
    if let Err(e) = try_init_tracing(TracingConfig::default()) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    // Run the client
    if let Err(e) = run().await {
        error!(error = %e, "Gateway client failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting gateway client...");

    // Load configuration
    let config = ClientConfig::from_env().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    info!(
        env = ?config.env,
        shard_count = ?config.gateway.shard_count,
        "Configuration loaded"
    );

    // Wire up the REST pipeline and the shard coordinator
    let rest = Arc::new(RestClient::new(&config.rest, config.token.clone())?);
    let coordinator = ShardCoordinator::new(config, rest, Arc::new(LoggingSink));

    coordinator.start().await?;

    // Run until interrupted
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    coordinator.stop().await;

    Ok(())
}
