//! Bounded retry with exponential backoff.
//!
//! [`retry`] knows nothing about HTTP: callers pass an operation and a
//! classifier that maps each failure to a [`RetryDecision`]. The API client
//! uses it for every page request; tests drive it with fake operations.
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
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

    /// Delay before the `retry`-th retry (0-based): `base_delay * 2^retry`.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after exactly this delay instead of the backoff schedule.
    RetryAfter(Duration),
    /// Retry after the policy's exponential delay.
    Backoff,
    /// Give up immediately without consuming the retry budget.
    Fail,
}

#[derive(Debug, Error)]
pub enum RetryError<E: Display> {
    #[error("{0}")]
    Permanent(E),
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
}

/// Run `op` until it succeeds, `classify` says [`RetryDecision::Fail`], or
/// the policy's retry budget is spent. Each attempt calls `op` afresh.
pub async fn retry<T, E, Op, Fut, C>(
    policy: &RetryPolicy,
    classify: C,
    mut op: Op,
) -> Result<T, RetryError<E>>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> RetryDecision,
    E: Display,
{
    let mut retries = 0u32;
    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let delay = match classify(&err) {
            RetryDecision::Fail => return Err(RetryError::Permanent(err)),
            _ if retries >= policy.max_retries => {
                return Err(RetryError::Exhausted {
                    attempts: retries + 1,
                    last: err,
                })
            }
            RetryDecision::RetryAfter(delay) => delay,
            RetryDecision::Backoff => policy.backoff_delay(retries),
        };

        retries += 1;
        warn!(
            attempt = retries,
            max_retries = policy.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "attempt failed; retrying"
        );
        tokio::time::sleep(delay).await;
    }
}
