//! Bounded exponential backoff for transient remote-call failures.
//!
//! Both the enumerator and the batch executor retry transient errors
//! (network, timeout, rate limit, server-side 5xx) with this policy before
//! giving up. Non-transient errors are never retried.

use std::time::Duration;

/// Retry policy applied to a single remote call.
///
/// `max_attempts` counts every try including the first, so `max_attempts: 1`
/// disables retries. The delay before attempt N+1 doubles from
/// `initial_backoff_milliseconds`, capped at `max_backoff_milliseconds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_milliseconds: u64,
    pub max_backoff_milliseconds: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            initial_backoff_milliseconds: 500,
            max_backoff_milliseconds: 32_000,
        }
    }
}

impl RetryPolicy {
    /// Delay to sleep after `completed_attempts` tries have failed.
    ///
    /// `completed_attempts` is 1-based: after the first failure the delay is
    /// the initial backoff, then it doubles per subsequent failure.
    pub fn delay_for(&self, completed_attempts: u32) -> Duration {
        let exponent = completed_attempts.saturating_sub(1).min(16);
        let milliseconds = self
            .initial_backoff_milliseconds
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_milliseconds);
        Duration::from_millis(milliseconds)
    }

    /// Whether another attempt is allowed after `completed_attempts` tries.
    pub fn allows_retry(&self, completed_attempts: u32) -> bool {
        completed_attempts < self.max_attempts
    }
}
