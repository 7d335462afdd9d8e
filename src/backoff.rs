//! Backoff policy and per-episode retry state.
//!
//! A restart episode runs from one session start attempt to the next fatal
//! failure or successful publish. [`RetryState`] accumulates over the episode
//! and resets only on a successful publish, never on login alone.

use std::time::Duration;

/// Exponential backoff parameters for session restarts.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Minimum delay, also the first attempt's delay.
    pub base: Duration,
    /// Upper bound for any single delay.
    pub cap: Duration,
    /// Consecutive attempts allowed before fatal escalation.
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(10),
            max_attempts: 5,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retrying after the given 1-based failed attempt.
    ///
    /// Doubles per attempt, clamped to `[base, cap]`, so the sequence is
    /// monotonically non-decreasing within an episode.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base
            .saturating_mul(2u32.saturating_pow(exponent))
            .clamp(self.base, self.cap)
    }
}

/// Attempt counter scoped to one restart episode.
#[derive(Debug, Default)]
pub struct RetryState {
    attempts: u32,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed attempt and return the new attempt count.
    pub fn record_failure(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Reset the episode after a successful publish.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
