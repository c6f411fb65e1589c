//! Bounded retry with linear backoff.

use std::time::Duration;

use tracing::warn;

use crate::error::ApiResult;

/// Retry policy for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = max_retries + 1)
    pub max_retries: u32,
    /// Delay before the first retry; later retries wait a multiple of it
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (zero-based): `base_delay * (retry + 1)`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(retry.saturating_add(1))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// retry budget is spent. `op` receives the zero-based attempt number.
    pub fn run<T, F>(&self, label: &str, op: F) -> ApiResult<T>
    where
        F: FnMut(u32) -> ApiResult<T>,
    {
        self.run_with_sleep(label, std::thread::sleep, op)
    }

    /// Same as [`RetryPolicy::run`] with an injectable sleep function.
    pub fn run_with_sleep<T, F, S>(&self, label: &str, mut sleep: S, mut op: F) -> ApiResult<T>
    where
        F: FnMut(u32) -> ApiResult<T>,
        S: FnMut(Duration),
    {
        let mut attempt = 0;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        call = label,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "API call failed, retrying"
                    );
                    sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
