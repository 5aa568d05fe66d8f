//! Retry policy applied uniformly to every remote call.
//!
//! Exponential backoff doubling from `wait_min`, clamped to `wait_max`.
//! Once the attempt budget is spent the last error is returned to the
//! caller unmodified.

use std::time::Duration;

/// Backoff window and attempt budget for one logical API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait before the first retry.
    pub wait_min: Duration,
    /// Upper clamp for the backoff wait.
    pub wait_max: Duration,
    /// Total attempts, including the first.
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Production profile: 10s–60s window, 5 attempts.
    pub fn standard() -> Self {
        RetryPolicy {
            wait_min: Duration::from_secs(10),
            wait_max: Duration::from_secs(60),
            max_attempts: 5,
        }
    }

    /// Fast profile for debugging and tests: 100ms–400ms window, 3 attempts.
    pub fn fast() -> Self {
        RetryPolicy {
            wait_min: Duration::from_millis(100),
            wait_max: Duration::from_millis(400),
            max_attempts: 3,
        }
    }

    /// Wait before retrying after `attempt` (0-based) failed.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.wait_min
            .saturating_mul(factor)
            .min(self.wait_max)
    }

    /// Whether a response status code qualifies for another attempt.
    /// Server-side errors and throttling are retryable; client errors are not.
    pub fn retryable_status(status: u16) -> bool {
        status == 429 || (500..600).contains(&status)
    }
}
