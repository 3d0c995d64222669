use std::time::Duration;

use tracing::warn;

use crate::error::Error;
use crate::error::Result;

/// Bounded retry schedule for transient backend failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u64,
    /// Delay before the second attempt; doubles for each attempt after that.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay to sleep after the failed attempt with this index.
    pub fn delay(&self, attempt: u64) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.min(u32::MAX as u64) as u32)
    }
}

/// Run `attempt_fn` until it succeeds, a non-transient error surfaces, or the
/// attempt budget is exhausted. The closure receives the attempt index in
/// `[0, max_attempts)`. Exhaustion wraps the last error in
/// [`Error::RetryLimit`].
pub(crate) async fn retry<F, Fut, T>(policy: RetryPolicy, mut attempt_fn: F) -> Result<T>
where
    F: FnMut(u64) -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match attempt_fn(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) => {
                if attempt + 1 == max_attempts {
                    return Err(Error::RetryLimit {
                        attempts: max_attempts,
                        last: Box::new(err),
                    });
                }
                let delay = policy.delay(attempt);
                warn!(attempt, ?delay, "transient backend error, retrying: {err}");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
