//! Exponential reconnect backoff with a capped delay.

use std::time::Duration;

use rand::Rng;

use crate::config::BackoffConfig;

/// Retry delay schedule for the connection loop.
///
/// Attempts are unbounded; the delay grows by `multiplier` per consecutive
/// failure until it reaches `max_delay`. With jitter enabled each delay is
/// drawn uniformly from `[ceiling / 2, ceiling]`.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    /// Fresh schedule starting at attempt 0.
    #[must_use]
    pub const fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Consecutive failures recorded since the last reset.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Un-jittered delay for the current attempt.
    #[must_use]
    pub fn ceiling(&self) -> Duration {
        let max = self.config.max_delay();
        let exponent = i32::try_from(self.attempt).unwrap_or(i32::MAX);
        let secs = self.config.initial_delay().as_secs_f64() * self.config.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= max.as_secs_f64() {
            return max;
        }
        Duration::try_from_secs_f64(secs).map_or(max, |d| d.min(max))
    }

    /// Delay to wait before the next retry; advances the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let ceiling = self.ceiling();
        self.attempt = self.attempt.saturating_add(1);
        if !self.config.jitter || ceiling.is_zero() {
            return ceiling;
        }
        let floor = ceiling / 2;
        rand::rng().random_range(floor..=ceiling)
    }

    /// Start over after a healthy connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
