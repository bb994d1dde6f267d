//! Bounded retry loop with linear backoff, independent of any storage medium.

use std::{future::Future, time::Duration};

use tokio::time::sleep;
use tracing::warn;

/// Default number of retries after the first failed attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default backoff step; the n-th retry waits `n * step`.
pub const DEFAULT_STEP: Duration = Duration::from_millis(100);

/// Outcome of a retried operation that did not succeed.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The failure was not transient and was returned immediately.
    Permanent(E),
    /// Every attempt failed with a transient error; `last` is the final one.
    Exhausted { attempts: u32, last: E },
}

/// Retry policy: up to `max_retries` additional attempts, waiting
/// `step`, `2 * step`, `3 * step`, … between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::linear(DEFAULT_MAX_RETRIES, DEFAULT_STEP)
    }
}

impl RetryPolicy {
    /// Build a linear backoff policy.
    pub const fn linear(max_retries: u32, step: Duration) -> Self {
        Self { max_retries, step }
    }

    /// Total number of attempts including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay to wait before the given retry (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.step * retry
    }

    /// Run `operation` until it succeeds, fails permanently, or exhausts the policy.
    ///
    /// `is_transient` decides which errors are worth another attempt.
    pub async fn run<T, E, F, Fut, P>(
        &self,
        label: &str,
        mut operation: F,
        is_transient: P,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut retry = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if !is_transient(&err) => return Err(RetryError::Permanent(err)),
                Err(err) if retry >= self.max_retries => {
                    return Err(RetryError::Exhausted {
                        attempts: retry + 1,
                        last: err,
                    });
                }
                Err(err) => {
                    retry += 1;
                    let delay = self.delay_for(retry);
                    warn!(
                        operation = label,
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient storage failure; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
