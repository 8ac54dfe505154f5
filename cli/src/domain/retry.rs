//! Retry policy shared by launch and bridge connect.
//!
//! The policy is pure data plus decisions; the async loop that sleeps between
//! attempts lives in `application::retry`.

use std::time::Duration;

use crate::domain::error::FleetError;

/// Bounded retry with a fixed backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Never below 1.
    pub max_attempts: u32,
    /// Delay between a failed attempt and the next one.
    pub backoff: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Same backoff, fewer attempts. Used by restart's reduced budget.
    #[must_use]
    pub fn with_max_attempts(self, max_attempts: u32) -> Self {
        Self::new(max_attempts, self.backoff)
    }

    /// Whether attempt number `attempt` (1-based) failing with `err` should
    /// be followed by another one.
    #[must_use]
    pub fn should_retry(&self, attempt: u32, err: &anyhow::Error) -> bool {
        attempt < self.max_attempts && is_retryable(err)
    }

    /// Delay before attempt `attempt + 1`, clipped so the sleep never outlives
    /// `remaining` wall-clock budget.
    #[must_use]
    pub fn delay_within(&self, remaining: Duration) -> Duration {
        self.backoff.min(remaining)
    }
}

/// Errors are retryable unless a typed [`FleetError`] in the chain says otherwise.
#[must_use]
pub fn is_retryable(err: &anyhow::Error) -> bool {
    FleetError::find(err).is_none_or(FleetError::is_retryable)
}
