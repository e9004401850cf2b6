//! Test fixtures: configurations and a recording event sink

use async_trait::async_trait;
use client_common::{BackoffConfig, ClientConfig, Environment, GatewayConfig, RestConfig};
use client_core::Intents;
use client_gateway::{EventSink, ShardState};
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Client configuration pointed at local mock servers
///
/// Fast reconnect backoff and a short identify stagger keep tests quick.
pub fn test_client_config(gateway_url: &str, rest_url: &str) -> ClientConfig {
    ClientConfig {
        token: "test-token".to_string(),
        intents: Intents::DEFAULT,
        env: Environment::Development,
        gateway: GatewayConfig {
            url: gateway_url.to_string(),
            shard_count: Some(1),
            shard_ids: None,
            identify_stagger_secs: 1,
            reconnect: BackoffConfig {
                base_ms: 10,
                max_ms: 50,
                max_attempts: 5,
            },
        },
        rest: RestConfig {
            base_url: rest_url.to_string(),
            timeout_secs: 5,
            global_requests_per_second: 50,
            max_retries: 3,
        },
    }
}

/// Event sink that records everything it receives
#[derive(Debug, Default)]
pub struct RecordingSink {
    states: Mutex<Vec<(u32, ShardState)>>,
    dispatches: Mutex<Vec<(u32, u64, String)>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// State transitions seen so far, in order
    pub fn states(&self) -> Vec<(u32, ShardState)> {
        self.states.lock().unwrap().clone()
    }

    /// Dispatch events seen so far, in order
    pub fn dispatches(&self) -> Vec<(u32, u64, String)> {
        self.dispatches.lock().unwrap().clone()
    }

    /// Count how many times a shard entered a state
    pub fn count_state(&self, shard_id: u32, state: ShardState) -> usize {
        self.states
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, s)| *id == shard_id && *s == state)
            .count()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn on_connection_state_changed(&self, shard_id: u32, state: ShardState) {
        self.states.lock().unwrap().push((shard_id, state));
    }

    async fn on_dispatch(&self, shard_id: u32, sequence: u64, event_name: &str, _payload: &Value) {
        self.dispatches
            .lock()
            .unwrap()
            .push((shard_id, sequence, event_name.to_string()));
    }
}
