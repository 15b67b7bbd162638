//! Poll interval policy
//!
//! The loop sleeps `current` between cycles. Every retryable failure adds a
//! fixed `step` up to `max`; any fully successful cycle drops back to `base`.
//! Growth is linear: the store is polled by a single client and a long
//! exponential tail would only delay the next answer.

use std::time::Duration;
use tracing::debug;

use crate::config::BackoffConfig;

/// Linear backoff between poll cycles
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    base: Duration,
    step: Duration,
    max: Duration,
    current: Duration,
    consecutive_failures: u32,
}

impl BackoffPolicy {
    /// Create a policy starting at `base`. `base` is clamped to `max`.
    pub fn new(base: Duration, step: Duration, max: Duration) -> Self {
        let base = base.min(max);
        Self {
            base,
            step,
            max,
            current: base,
            consecutive_failures: 0,
        }
    }

    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(config.base(), config.step(), config.max())
    }

    /// Sleep duration for the next cycle
    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Record a retryable failure and return the new interval.
    pub fn on_retryable(&mut self) -> Duration {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.current = self.current.saturating_add(self.step).min(self.max);
        debug!(
            "Backoff escalated to {:?} after {} consecutive failures",
            self.current, self.consecutive_failures
        );
        self.current
    }

    /// Record a successful cycle and return the (base) interval.
    pub fn on_success(&mut self) -> Duration {
        if self.consecutive_failures > 0 {
            debug!("Backoff reset to {:?}", self.base);
        }
        self.consecutive_failures = 0;
        self.current = self.base;
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_secs(5),
            Duration::from_secs(5),
            Duration::from_secs(30),
        )
    }

    #[test]
    fn test_starts_at_base() {
        assert_eq!(policy().current(), Duration::from_secs(5));
    }

    #[test]
    fn test_linear_growth_capped() {
        let mut backoff = policy();
        let seen: Vec<u64> = (0..8).map(|_| backoff.on_retryable().as_secs()).collect();

        assert_eq!(seen, vec![10, 15, 20, 25, 30, 30, 30, 30]);
        assert_eq!(backoff.consecutive_failures(), 8);
    }

    #[test]
    fn test_success_resets() {
        let mut backoff = policy();
        backoff.on_retryable();
        backoff.on_retryable();

        assert_eq!(backoff.on_success(), Duration::from_secs(5));
        assert_eq!(backoff.consecutive_failures(), 0);
    }

    #[test]
    fn test_base_above_max_is_clamped() {
        let backoff = BackoffPolicy::new(
            Duration::from_secs(60),
            Duration::from_secs(1),
            Duration::from_secs(30),
        );
        assert_eq!(backoff.current(), Duration::from_secs(30));
    }
}
