//! Identify rate limiting
//!
//! The platform permits one fresh identify per stagger window across the
//! whole process. Every shard acquires a permit here before identifying;
//! resumes bypass the throttle entirely.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Serializes identify handshakes across all shards
///
/// Waiters queue on the internal mutex, which tokio grants in FIFO order,
/// so shards identify in the order they asked.
#[derive(Debug)]
pub struct IdentifyThrottle {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl IdentifyThrottle {
    /// Create a throttle granting one permit per `interval`
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Wait for the next identify slot
    ///
    /// Returns once at least `interval` has passed since the previous
    /// permit was granted. The first caller proceeds immediately.
    pub async fn acquire(&self) {
        let mut slot = self.next_slot.lock().await;
        let now = Instant::now();

        match *slot {
            Some(next) if next > now => {
                tokio::time::sleep_until(next).await;
                *slot = Some(next + self.interval);
            }
            _ => {
                *slot = Some(now + self.interval);
            }
        }
    }

    /// The configured stagger interval
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}
