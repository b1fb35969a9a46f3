//! Retry with exponential backoff
//!
//! The decision whether to try again is a pure function of the attempt number
//! and the error, kept apart from the loop that sleeps and re-runs the
//! operation.
//!
//! **Backoff Strategy:**
//! - Wait before retry `n` (0-based): `base_delay * 2^n`
//! - Attempts: `max_attempts` in total, first try included
//! - Permanent errors give up immediately

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Largest exponent applied to the base delay
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Errors that know whether another attempt could succeed
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Decide after attempt `attempt` (0-based) failed with `error`
    pub fn decide<E: Retryable>(&self, attempt: u32, error: &E) -> RetryDecision {
        if !error.is_transient() || attempt + 1 >= self.max_attempts {
            RetryDecision::GiveUp
        } else {
            RetryDecision::RetryAfter(self.backoff(attempt))
        }
    }

    /// `base_delay * 2^attempt`
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(1u32 << attempt.min(MAX_BACKOFF_EXPONENT))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Outcome of a retried operation together with the attempts it took
#[derive(Debug)]
pub struct Attempted<T> {
    pub outcome: T,
    pub attempts: u32,
}

/// Run `operation` until it succeeds or `policy` gives up.
///
/// The closure receives the 0-based attempt number. Once `cancel` fires no
/// further attempt starts: a pending backoff is abandoned and the last error
/// is returned.
pub async fn retry_with_backoff<F, Fut, T, E>(
    operation_name: &str,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Attempted<Result<T, E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let mut attempt = 0u32;

    loop {
        if attempt > 0 {
            tracing::debug!(operation = operation_name, attempt, "Retrying operation");
        }

        let err = match operation(attempt).await {
            Ok(value) => {
                return Attempted {
                    outcome: Ok(value),
                    attempts: attempt + 1,
                }
            }
            Err(err) => err,
        };

        let backoff = match policy.decide(attempt, &err) {
            RetryDecision::GiveUp => {
                tracing::error!(
                    operation = operation_name,
                    attempts = attempt + 1,
                    transient = err.is_transient(),
                    error = %err,
                    "Operation failed, giving up"
                );
                return Attempted {
                    outcome: Err(err),
                    attempts: attempt + 1,
                };
            }
            RetryDecision::RetryAfter(backoff) => backoff,
        };

        tracing::warn!(
            operation = operation_name,
            attempt = attempt + 1,
            backoff_ms = backoff.as_millis() as u64,
            error = %err,
            "Operation failed, will retry after backoff"
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(
                    operation = operation_name,
                    attempts = attempt + 1,
                    "Cancelled during backoff, not retrying"
                );
                return Attempted {
                    outcome: Err(err),
                    attempts: attempt + 1,
                };
            }
            _ = tokio::time::sleep(backoff) => {}
        }

        attempt += 1;
    }
}
