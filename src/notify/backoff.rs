//! Bounded exponential backoff for the poll loop.

use serde::Deserialize;
use std::time::Duration;

/// Backoff policy applied after a failed poll round.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay after the first failure, in milliseconds.
    pub base_ms: u64,
    /// Upper bound for any single delay, in milliseconds.
    pub max_ms: u64,
    /// Exponential factor applied per consecutive failure.
    pub factor: f64,
    /// Number of consecutive successes required to decrease the error count.
    pub recovery_interval: usize,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: 1_000,
            max_ms: 60_000,
            factor: 2.0,
            recovery_interval: 1,
        }
    }
}

impl BackoffConfig {
    /// Maximum delay as a `Duration`.
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }
}

/// Tracks consecutive failures and derives the next retry delay.
#[derive(Debug)]
pub(crate) struct BackoffState {
    config: BackoffConfig,
    error_count: usize,
    success_streak: usize,
}

impl BackoffState {
    pub(crate) fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            error_count: 0,
            success_streak: 0,
        }
    }

    /// Registers a failure and returns the delay before the next attempt.
    pub(crate) fn register_error(&mut self) -> Duration {
        self.success_streak = 0;
        self.error_count = self.error_count.saturating_add(1);
        // Capped so powi() stays finite; the max_ms clamp applies long before this.
        let exponent = self.error_count.saturating_sub(1).min(64) as i32;
        let delay_ms = self.config.base_ms as f64 * self.config.factor.max(1.0).powi(exponent);
        let capped = delay_ms.min(self.config.max_ms as f64);
        Duration::from_millis(capped as u64)
    }

    /// Registers a successful round, decaying the error count over time.
    pub(crate) fn register_success(&mut self) {
        if self.error_count == 0 {
            return;
        }
        if self.config.recovery_interval == 0 {
            self.error_count = 0;
            self.success_streak = 0;
            return;
        }

        self.success_streak = self.success_streak.saturating_add(1);
        if self.success_streak >= self.config.recovery_interval {
            self.error_count = self.error_count.saturating_sub(2);
            self.success_streak = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_grow_and_cap() {
        let mut state = BackoffState::new(BackoffConfig {
            base_ms: 100,
            max_ms: 350,
            factor: 2.0,
            recovery_interval: 1,
        });

        assert_eq!(state.register_error(), Duration::from_millis(100));
        assert_eq!(state.register_error(), Duration::from_millis(200));
        assert_eq!(state.register_error(), Duration::from_millis(350));
        assert_eq!(state.register_error(), Duration::from_millis(350));
    }

    #[test]
    fn test_never_overflows() {
        let mut state = BackoffState::new(BackoffConfig::default());
        let mut last = Duration::ZERO;
        for _ in 0..10_000 {
            last = state.register_error();
        }
        assert_eq!(last, BackoffConfig::default().max_delay());
    }

    #[test]
    fn test_success_decays_error_count() {
        let config = BackoffConfig {
            base_ms: 10,
            max_ms: 1_000,
            factor: 2.0,
            recovery_interval: 2,
        };
        let mut state = BackoffState::new(config);
        assert_eq!(state.register_error(), Duration::from_millis(10));
        assert_eq!(state.register_error(), Duration::from_millis(20));
        assert_eq!(state.register_error(), Duration::from_millis(40));

        // One success is not enough with a recovery interval of two.
        state.register_success();
        assert_eq!(state.register_error(), Duration::from_millis(80));

        state.register_success();
        state.register_success();
        assert_eq!(state.register_error(), Duration::from_millis(40));
    }

    #[test]
    fn test_zero_recovery_interval_resets() {
        let mut state = BackoffState::new(BackoffConfig {
            base_ms: 10,
            max_ms: 1_000,
            factor: 3.0,
            recovery_interval: 0,
        });
        state.register_error();
        state.register_error();
        state.register_success();
        assert_eq!(state.register_error(), Duration::from_millis(10));
    }
}
