use crate::error::GenerationError;
use std::future::Future;
use std::time::Duration;

/// Capped exponential backoff, no jitter.
///
/// The wait after the zero-based attempt `k` is `min(base_delay * 2^k, max_delay)`.
/// Only errors for which [`GenerationError::is_retryable`] holds are retried; any
/// other outcome is returned as is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Runs `op` until it succeeds, fails for good, or attempts run out.
    /// `op` receives the one-based attempt number.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, GenerationError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, GenerationError>>,
    {
        for attempt in 0..self.max_attempts {
            match op(attempt + 1).await {
                Err(err) if err.is_retryable() => {
                    if attempt + 1 < self.max_attempts {
                        let wait = self.delay(attempt);
                        tracing::warn!(attempt = attempt + 1, ?wait, "{err}, retrying");
                        tokio::time::sleep(wait).await;
                    }
                }
                outcome => return outcome,
            }
        }
        Err(GenerationError::RetriesExhausted {
            attempts: self.max_attempts,
        })
    }
}
