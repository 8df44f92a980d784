//! Retry-with-backoff for rate-limited LLM calls.
//!
//! [`RetryPolicy::execute`] wraps any call shaped `FnMut() -> Future<Output =
//! Result<T, LlmCallError>>`. It knows nothing about what the call does, so
//! the same policy serves text generation, grounded generation and image
//! generation alike.
//!
//! Only rate-limit signals are retried. The wait before retry `n` (1-based) is
//! `initial_delay * 2^(n-1)` plus a random jitter in `0..=max_jitter`, which
//! spreads concurrent workers apart after a shared 429. Any other error is
//! returned on the spot.

use crate::error::LlmCallError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_jitter: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    pub fn with_backoff(mut self, initial_delay: Duration, max_jitter: Duration) -> Self {
        self.initial_delay = initial_delay;
        self.max_jitter = max_jitter;
        self
    }

    /// Deterministic part of the wait before retry `retry` (1-based).
    pub fn base_delay(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(16);
        self.initial_delay.saturating_mul(1u32 << exp)
    }

    fn delay_with_jitter(&self, retry: u32) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=jitter_ms)
        } else {
            0
        };
        self.base_delay(retry) + Duration::from_millis(jitter)
    }

    /// Run `op` until it succeeds, fails with a non-rate-limit error, or the
    /// retry budget is spent.
    ///
    /// `label` only appears in log lines.
    ///
    /// # Errors
    /// * the first non-rate-limit error, unchanged;
    /// * [`LlmCallError::RateLimitExceeded`] after `max_retries + 1` rate-limited
    ///   attempts, wrapping the last cause.
    pub async fn execute<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, LlmCallError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LlmCallError>>,
    {
        let mut retries: u32 = 0;
        loop {
            match op().await {
                Ok(value) => {
                    if retries > 0 {
                        debug!("{label}: succeeded after {retries} retries");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_rate_limit_signal() => {
                    retries += 1;
                    if retries > self.max_retries {
                        warn!("{label}: rate limited, giving up after {retries} attempts");
                        return Err(LlmCallError::RateLimitExceeded {
                            attempts: retries,
                            source: Box::new(e),
                        });
                    }
                    let delay = self.delay_with_jitter(retries);
                    warn!(
                        "{label}: rate limited, retry {}/{} in {}ms",
                        retries,
                        self.max_retries,
                        delay.as_millis()
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
