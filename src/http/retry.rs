//! Retry policy for transient upstream failures.

use std::time::Duration;

use super::error::RawFailure;

/// Maximum number of retries after the initial attempt.
pub const MAX_RETRIES: usize = 3;

/// Upper bound accepted by [`RetryPolicy::with_max_retries`]. Keeps `2^retry`
/// within a `u32` multiplier, so every backoff step stays strictly larger.
pub const MAX_RETRY_LIMIT: usize = 30;

/// Base delay for exponential backoff in milliseconds.
pub const RETRY_BASE_DELAY_MS: u64 = 100;

/// Status codes that are retried: rate limited and not implemented.
pub const RETRYABLE_STATUSES: [u16; 2] = [429, 501];

/// Controls how many times, on which statuses, and how long to wait between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: usize,
    retryable_statuses: Vec<u16>,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            retryable_statuses: RETRYABLE_STATUSES.to_vec(),
            base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Sets the retry budget, capped at [`MAX_RETRY_LIMIT`].
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries.min(MAX_RETRY_LIMIT);
        self
    }

    /// Sets the delay doubled on each retry.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Replaces the statuses that trigger a retry.
    pub fn with_retryable_statuses(mut self, statuses: &[u16]) -> Self {
        self.retryable_statuses = statuses.to_vec();
        self
    }

    /// Number of retries after the initial attempt.
    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Statuses that trigger a retry.
    pub fn retryable_statuses(&self) -> &[u16] {
        &self.retryable_statuses
    }

    /// Delay the backoff starts from.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Only failures carrying a listed upstream status are retried.
    /// Transport and local failures never are.
    pub fn should_retry(&self, failure: &RawFailure) -> bool {
        failure
            .status()
            .is_some_and(|status| self.retryable_statuses.contains(&status))
    }

    /// Delay before retry number `retry` (1-based): `base_delay * 2^retry`.
    ///
    /// `retry` is at most [`MAX_RETRY_LIMIT`] inside the dispatch loop. Only a
    /// base delay of centuries overflows, and that saturates at `Duration::MAX`.
    pub fn delay_for(&self, retry: usize) -> Duration {
        let multiplier = u32::try_from(retry)
            .ok()
            .and_then(|exponent| 2u32.checked_pow(exponent));

        multiplier
            .and_then(|m| self.base_delay.checked_mul(m))
            .unwrap_or(Duration::MAX)
    }
}
