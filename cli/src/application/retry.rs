//! Async retry loop driven by a [`RetryPolicy`].

use std::future::Future;

use tokio::time::Instant;

use crate::domain::retry::RetryPolicy;

/// All attempts failed (or the deadline/classification stopped early).
#[derive(Debug)]
pub struct Exhausted {
    /// Attempts actually made.
    pub attempts: u32,
    pub last: anyhow::Error,
}

/// Run `op` until it succeeds, the policy gives up, or `deadline` passes.
///
/// `op` receives the 1-based attempt number. Non-retryable errors stop the
/// loop immediately.
///
/// # Errors
///
/// Returns [`Exhausted`] with the last error when no attempt succeeded.
pub async fn retry<T, F, Fut>(
    policy: RetryPolicy,
    deadline: Option<Instant>,
    what: &str,
    mut op: F,
) -> Result<T, Exhausted>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut attempt = 1;
    loop {
        let err = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !policy.should_retry(attempt, &err) {
            return Err(Exhausted {
                attempts: attempt,
                last: err,
            });
        }
        let remaining = deadline.map_or(policy.backoff, |d| {
            d.saturating_duration_since(Instant::now())
        });
        if remaining.is_zero() {
            tracing::warn!(attempt, "{what}: deadline reached, giving up");
            return Err(Exhausted {
                attempts: attempt,
                last: err,
            });
        }
        tracing::warn!(attempt, max = policy.max_attempts, "{what} failed: {err:#}");
        tokio::time::sleep(policy.delay_within(remaining)).await;
        attempt += 1;
    }
}
