//! Retry budget and jittered exponential backoff

use rand::Rng;
use std::time::Duration;

/// Largest retry budget for which backoff delays keep doubling
pub const MAX_RETRIES: u32 = 16;

/// How many times a request may be retried and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt; `3` means up to 4 attempts
    pub max_retries: u32,
    /// Backoff unit, must be non-zero
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Total attempts allowed, including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Whether another attempt may follow the given (1-based) attempt
    pub fn can_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }

    /// Delay to wait after the given (1-based) failed attempt
    pub fn delay_for<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        backoff_delay(attempt, self.base_delay, rng)
    }
}

/// `base * 2^(attempt-1)` plus jitter drawn uniformly from `[0, base)`.
///
/// With a non-zero base the result is never zero and strictly increases with
/// `attempt` up to [`MAX_RETRIES`]: the largest jitter of attempt n stays below
/// the fixed part of attempt n+1. Later attempts reuse the last exponent.
pub fn backoff_delay<R: Rng + ?Sized>(attempt: u32, base: Duration, rng: &mut R) -> Duration {
    let base_ms = base.as_millis().max(1) as u64;
    let exponent = attempt.saturating_sub(1).min(MAX_RETRIES - 1);
    let nominal = base_ms.saturating_mul(1u64 << exponent);
    let jitter = rng.gen_range(0..base_ms);

    Duration::from_millis(nominal.saturating_add(jitter))
}
