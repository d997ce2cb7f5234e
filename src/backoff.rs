//! Reconnect backoff.
//!
//! `delay(n) = min(initial * factor^n, max)` where `n` is the number of
//! reconnect timers that have fired since the last successful open.

use std::time::Duration;

pub const DEFAULT_INITIAL_MS: u64 = 1000;
pub const DEFAULT_FACTOR: f64 = 1.6;
pub const DEFAULT_MAX_MS: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub initial_ms: u64,
    pub factor: f64,
    pub max_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self { initial_ms: DEFAULT_INITIAL_MS, factor: DEFAULT_FACTOR, max_ms: DEFAULT_MAX_MS }
    }
}

impl BackoffPolicy {
    /// A usable policy starts above zero, never shrinks, and caps at or
    /// above its first delay.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.initial_ms > 0 && self.factor.is_finite() && self.factor >= 1.0 && self.max_ms >= self.initial_ms
    }

    /// Delay before reconnect attempt number `attempt`, capped at `max_ms`.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let raw = self.initial_ms as f64 * self.factor.powi(exponent);
        let capped = raw.min(self.max_ms as f64).max(0.0);
        Duration::from_millis(capped.round() as u64)
    }
}

/// Attempt counter paired with its policy.
#[derive(Debug, Clone, Default)]
pub struct Backoff {
    policy: BackoffPolicy,
    attempt: u32,
}

impl Backoff {
    #[must_use]
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay for the next scheduled reconnect.
    #[must_use]
    pub fn next_delay(&self) -> Duration {
        self.policy.delay(self.attempt)
    }

    pub fn advance(&mut self) {
        self.attempt = self.attempt.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
#[path = "backoff_test.rs"]
mod tests;
