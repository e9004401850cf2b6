//! Reconnect backoff
//!
//! Exponential backoff with full jitter and a bounded attempt budget.
//! Exhausting the budget marks the shard fatally failed instead of
//! retrying forever.

use client_common::BackoffConfig;
use rand::Rng;
use std::time::Duration;

/// Exponential backoff state for one shard's reconnect loop
#[derive(Debug)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    max_attempts: u32,
    attempts: u32,
}

impl Backoff {
    /// Create a backoff from the configured policy
    #[must_use]
    pub fn new(config: &BackoffConfig) -> Self {
        Self {
            base: Duration::from_millis(config.base_ms),
            max: Duration::from_millis(config.max_ms),
            max_attempts: config.max_attempts,
            attempts: 0,
        }
    }

    /// Get the delay before the next attempt, or None if the budget is spent
    ///
    /// The delay is drawn uniformly from (0, base * 2^attempt] capped at the
    /// configured maximum, so simultaneously-dropped shards spread out.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }

        let exp = self.base.saturating_mul(1u32 << self.attempts.min(16));
        let cap = exp.min(self.max).max(Duration::from_millis(1));
        self.attempts += 1;

        let jittered = rand::thread_rng().gen_range(1..=cap.as_millis() as u64);
        Some(Duration::from_millis(jittered))
    }

    /// Number of attempts consumed in the current outage
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Reset after a successful session establishment
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}
