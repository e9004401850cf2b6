//! Shard coordinator implementation

use crate::error::{GatewayError, GatewayResult};
use crate::events::{EventSink, GatewayEvent};
use crate::shard::{GatewayConnection, IdentifyThrottle, ShardState, ShardStatus};
use chrono::{DateTime, Utc};
use client_common::ClientConfig;
use client_rest::{RestClient, Route};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Buffer between connection tasks and the event forwarder
const EVENT_BUFFER_SIZE: usize = 1024;

/// Shard topology recommended by the platform (`GET /gateway/bot`)
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayBot {
    /// Gateway URL to connect to
    pub url: String,
    /// Recommended shard count for this token
    pub shards: u32,
    /// Identify budget information
    #[serde(default)]
    pub session_start_limit: Option<SessionStartLimit>,
}

/// Identify budget for the current window
#[derive(Debug, Clone, Deserialize)]
pub struct SessionStartLimit {
    pub total: u32,
    pub remaining: u32,
    #[serde(default)]
    pub max_concurrency: Option<u32>,
}

/// One spawned shard: its published status and running task
struct ShardHandle {
    status: Arc<RwLock<ShardStatus>>,
    join: JoinHandle<()>,
}

/// Creates, starts, monitors, and stops the set of gateway connections
///
/// Each shard's live state belongs to its own task; the coordinator reads
/// published snapshots only. A single shard's fatal failure never brings
/// down its siblings.
pub struct ShardCoordinator {
    config: ClientConfig,
    rest: Arc<RestClient>,
    throttle: Arc<IdentifyThrottle>,
    shards: DashMap<u32, ShardHandle>,
    shard_count: RwLock<Option<u32>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    events_tx: Mutex<Option<mpsc::Sender<GatewayEvent>>>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
    started_at: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl ShardCoordinator {
    /// Create a coordinator; no connections are made until [`Self::start`]
    pub fn new(config: ClientConfig, rest: Arc<RestClient>, sink: Arc<dyn EventSink>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER_SIZE);
        let started_at = Arc::new(RwLock::new(None));
        let forwarder = tokio::spawn(forward_events(events_rx, sink, Arc::clone(&started_at)));
        let throttle = Arc::new(IdentifyThrottle::new(Duration::from_secs(
            config.gateway.identify_stagger_secs,
        )));

        Self {
            config,
            rest,
            throttle,
            shards: DashMap::new(),
            shard_count: RwLock::new(None),
            shutdown_tx,
            shutdown_rx,
            events_tx: Mutex::new(Some(events_tx)),
            forwarder: Mutex::new(Some(forwarder)),
            started_at,
        }
    }

    /// Start every configured shard
    ///
    /// Resolves the shard count (asking the platform when not configured),
    /// validates the shard IDs, and spawns connections in ascending order.
    /// The shared identify throttle spaces the fresh identifies out; the
    /// call returns as soon as all tasks are spawned.
    pub async fn start(&self) -> GatewayResult<()> {
        if self.shard_count.read().is_some() {
            tracing::warn!("Coordinator already started");
            return Ok(());
        }

        let shard_count = match self.config.gateway.shard_count {
            Some(count) => count,
            None => self.fetch_recommended_shards().await?,
        };
        if shard_count == 0 {
            return Err(GatewayError::InvalidShardConfig(
                "shard count must be positive".to_string(),
            ));
        }

        let mut shard_ids = self
            .config
            .gateway
            .shard_ids
            .clone()
            .unwrap_or_else(|| (0..shard_count).collect());
        shard_ids.sort_unstable();
        shard_ids.dedup();

        if shard_ids.is_empty() {
            return Err(GatewayError::InvalidShardConfig("no shards to run".to_string()));
        }
        for &shard_id in &shard_ids {
            if shard_id >= shard_count {
                return Err(GatewayError::InvalidShardConfig(format!(
                    "shard {shard_id} outside [0, {shard_count})"
                )));
            }
        }

        *self.shard_count.write() = Some(shard_count);
        tracing::info!(
            shard_count = shard_count,
            owned = shard_ids.len(),
            "Starting shards"
        );

        for shard_id in shard_ids {
            self.spawn_shard(shard_id, shard_count)?;
        }

        Ok(())
    }

    /// Stop every shard and release coordinator state
    ///
    /// Signals a clean close (no reconnect), waits for all connection
    /// tasks, then drains and stops the event forwarder. Safe to call from
    /// a failure handler and safe to call twice.
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(true);

        let shard_ids: Vec<u32> = self.shards.iter().map(|entry| *entry.key()).collect();
        for shard_id in shard_ids {
            if let Some((_, handle)) = self.shards.remove(&shard_id) {
                if let Err(e) = handle.join.await {
                    tracing::warn!(
                        shard_id = shard_id,
                        error = %e,
                        "Shard task did not shut down cleanly"
                    );
                }
            }
        }

        // Dropping the last sender ends the forwarder after it drains
        drop(self.events_tx.lock().take());
        let forwarder = self.forwarder.lock().take();
        if let Some(forwarder) = forwarder {
            let _ = forwarder.await;
        }

        tracing::info!("Coordinator stopped");
    }

    /// Restart a shard that failed fatally
    ///
    /// Failed shards are never restarted automatically; this is the
    /// explicit external restart. Running shards are left alone.
    pub fn restart_shard(&self, shard_id: u32) -> GatewayResult<()> {
        let Some(shard_count) = *self.shard_count.read() else {
            return Err(GatewayError::InvalidShardConfig(
                "coordinator not started".to_string(),
            ));
        };
        if shard_id >= shard_count {
            return Err(GatewayError::InvalidShardConfig(format!(
                "shard {shard_id} outside [0, {shard_count})"
            )));
        }

        if let Some((_, handle)) = self.shards.remove(&shard_id) {
            let state = handle.status.read().state;
            if !handle.join.is_finished() && !state.is_terminal() {
                self.shards.insert(shard_id, handle);
                return Err(GatewayError::InvalidShardConfig(format!(
                    "shard {shard_id} is still running"
                )));
            }
        }

        tracing::info!(shard_id = shard_id, "Restarting shard");
        self.spawn_shard(shard_id, shard_count)
    }

    /// Per-shard heartbeat latency; None for shards without a full cycle yet
    #[must_use]
    pub fn latencies(&self) -> HashMap<u32, Option<Duration>> {
        self.shards
            .iter()
            .map(|entry| (*entry.key(), entry.value().status.read().latency))
            .collect()
    }

    /// Mean latency over shards that completed a heartbeat cycle
    #[must_use]
    pub fn average_latency(&self) -> Option<Duration> {
        let latencies: Vec<Duration> = self
            .shards
            .iter()
            .filter_map(|entry| entry.value().status.read().latency)
            .collect();

        if latencies.is_empty() {
            return None;
        }
        Some(latencies.iter().sum::<Duration>() / latencies.len() as u32)
    }

    /// Connection state of every owned shard
    #[must_use]
    pub fn shard_states(&self) -> HashMap<u32, ShardState> {
        self.shards
            .iter()
            .map(|entry| (*entry.key(), entry.value().status.read().state))
            .collect()
    }

    /// Connection state of one shard
    #[must_use]
    pub fn shard_state(&self, shard_id: u32) -> Option<ShardState> {
        self.shards
            .get(&shard_id)
            .map(|handle| handle.status.read().state)
    }

    /// When the first shard reached Connected; None if none has
    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        *self.started_at.read()
    }

    /// Time since the first shard connected; zero if never started
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started_at()
            .map(|at| (Utc::now() - at).to_std().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Number of shards currently owned
    #[must_use]
    pub fn shard_len(&self) -> usize {
        self.shards.len()
    }

    fn spawn_shard(&self, shard_id: u32, shard_count: u32) -> GatewayResult<()> {
        let events_tx = self.events_tx.lock().clone().ok_or_else(|| {
            GatewayError::InvalidShardConfig("coordinator is stopped".to_string())
        })?;

        let status = Arc::new(RwLock::new(ShardStatus::new()));
        let connection = GatewayConnection::new(
            shard_id,
            shard_count,
            &self.config,
            Arc::clone(&status),
            events_tx,
            Arc::clone(&self.throttle),
            self.shutdown_rx.clone(),
        );

        let join = tokio::spawn(connection.run());
        self.shards.insert(shard_id, ShardHandle { status, join });

        Ok(())
    }

    async fn fetch_recommended_shards(&self) -> GatewayResult<u32> {
        let info: GatewayBot = self
            .rest
            .request_json(&Route::get_gateway_bot(), None)
            .await?;

        tracing::info!(shards = info.shards, "Fetched recommended shard count");
        Ok(info.shards)
    }
}

impl std::fmt::Debug for ShardCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardCoordinator")
            .field("shards", &self.shards.len())
            .field("shard_count", &*self.shard_count.read())
            .finish()
    }
}

/// Drain the event channel into the application sink
///
/// Also records the coordinator's started-at timestamp the first time any
/// shard reaches Connected.
async fn forward_events(
    mut events_rx: mpsc::Receiver<GatewayEvent>,
    sink: Arc<dyn EventSink>,
    started_at: Arc<RwLock<Option<DateTime<Utc>>>>,
) {
    while let Some(event) = events_rx.recv().await {
        match event {
            GatewayEvent::StateChanged { shard_id, state } => {
                if state == ShardState::Connected {
                    let mut guard = started_at.write();
                    if guard.is_none() {
                        *guard = Some(Utc::now());
                    }
                }
                sink.on_connection_state_changed(shard_id, state).await;
            }
            GatewayEvent::Dispatch {
                shard_id,
                sequence,
                event_name,
                data,
            } => {
                sink.on_dispatch(shard_id, sequence, &event_name, &data).await;
            }
        }
    }
}
