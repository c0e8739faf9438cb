//! Bounded retry with an escalating per-attempt timeout.
//!
//! Attempt `i` (0-based) gets `base_timeout + i * timeout_increment`; the
//! pause between a failed attempt and the next is the constant `interval`.
//! Later attempts get more time rather than a longer wait.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::cancel::{CancellationSignal, await_or_cancel, is_cancelled, sleep_or_cancel};

/// Retry configuration for one kind of operation.
///
/// A zero `base_timeout` together with a zero `timeout_increment` disables the
/// per-attempt deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    pub base_timeout: Duration,
    pub timeout_increment: Duration,
    /// Constant pause between a failed attempt and the next one.
    pub interval: Duration,
}

/// One attempt handed to the retried operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub index: u32,
    pub total: u32,
    pub timeout: Duration,
}

impl Attempt {
    #[must_use]
    pub const fn is_retry(&self) -> bool {
        self.index > 0
    }

    /// 1-based attempt number for log output.
    #[must_use]
    pub const fn number(&self) -> u32 {
        self.index + 1
    }
}

/// Why a single attempt failed.
#[derive(Debug, Error)]
pub enum AttemptFailure<E> {
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("{0}")]
    Failed(E),
}

/// Terminal failure of a retried operation.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("{operation}: all {attempts} attempts failed, last error: {last}")]
    Exhausted { operation: String, attempts: u32, last: AttemptFailure<E> },
    #[error("{operation}: cancelled")]
    Cancelled { operation: String },
}

impl<E> RetryError<E> {
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// The last underlying failure, if the attempts were exhausted.
    #[must_use]
    pub const fn last_failure(&self) -> Option<&AttemptFailure<E>> {
        match self {
            Self::Exhausted { last, .. } => Some(last),
            Self::Cancelled { .. } => None,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(
        max_retries: u32,
        base_timeout: Duration,
        timeout_increment: Duration,
        interval: Duration,
    ) -> Self {
        Self { max_retries, base_timeout, timeout_increment, interval }
    }

    /// Total attempts: the initial one plus `max_retries`.
    #[must_use]
    pub const fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Effective timeout for attempt `index`.
    #[must_use]
    pub fn timeout_for(&self, index: u32) -> Duration {
        self.base_timeout.saturating_add(self.timeout_increment.saturating_mul(index))
    }

    fn attempt(&self, index: u32) -> Attempt {
        Attempt { index, total: self.total_attempts(), timeout: self.timeout_for(index) }
    }

    /// Runs `op` until it succeeds or every attempt has failed.
    ///
    /// Timeouts and operation errors are retried the same way; only the log
    /// line differs. Sleeping between attempts suspends only the calling task.
    ///
    /// # Errors
    /// Returns [`RetryError::Exhausted`] carrying the last failure once all
    /// attempts are used, or [`RetryError::Cancelled`] if the signal fires.
    pub async fn run<T, E, F, Fut>(
        &self,
        operation: &str,
        cancellation: Option<&CancellationSignal>,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let cancelled = || RetryError::Cancelled { operation: operation.to_owned() };
        let mut index = 0;

        loop {
            if is_cancelled(cancellation) {
                return Err(cancelled());
            }

            let attempt = self.attempt(index);
            let failure = match self.run_attempt(attempt, cancellation, &mut op).await {
                Ok(Ok(value)) => {
                    if attempt.is_retry() {
                        tracing::info!(
                            operation,
                            attempt = attempt.number(),
                            total = attempt.total,
                            "succeeded on retry"
                        );
                    }
                    return Ok(value);
                },
                Ok(Err(failure)) => failure,
                Err(_) => return Err(cancelled()),
            };

            if index >= self.max_retries {
                tracing::error!(
                    operation,
                    attempts = attempt.total,
                    error = %failure,
                    "all attempts failed"
                );
                return Err(RetryError::Exhausted {
                    operation: operation.to_owned(),
                    attempts: attempt.total,
                    last: failure,
                });
            }

            match &failure {
                AttemptFailure::TimedOut(after) => tracing::warn!(
                    operation,
                    attempt = attempt.number(),
                    total = attempt.total,
                    timeout_secs = after.as_secs_f64(),
                    retry_in_secs = self.interval.as_secs_f64(),
                    "attempt timed out, retrying"
                ),
                AttemptFailure::Failed(e) => tracing::warn!(
                    operation,
                    attempt = attempt.number(),
                    total = attempt.total,
                    error = %e,
                    retry_in_secs = self.interval.as_secs_f64(),
                    "attempt failed, retrying"
                ),
            }

            sleep_or_cancel(self.interval, cancellation).await.map_err(|_| cancelled())?;
            index += 1;
        }
    }

    async fn run_attempt<T, E, F, Fut>(
        &self,
        attempt: Attempt,
        cancellation: Option<&CancellationSignal>,
        op: &mut F,
    ) -> Result<Result<T, AttemptFailure<E>>, crate::cancel::Cancelled>
    where
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if attempt.timeout.is_zero() {
            let result = await_or_cancel(op(attempt), cancellation).await?;
            return Ok(result.map_err(AttemptFailure::Failed));
        }

        let result =
            await_or_cancel(tokio::time::timeout(attempt.timeout, op(attempt)), cancellation)
                .await?;
        Ok(match result {
            Ok(inner) => inner.map_err(AttemptFailure::Failed),
            Err(_) => Err(AttemptFailure::TimedOut(attempt.timeout)),
        })
    }
}
