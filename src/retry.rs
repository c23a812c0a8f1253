//! Retry-with-backoff for arbitrary asynchronous operations.
//!
//! The policy is independent from the interceptor: it retries any operation
//! whose error reports a retry-eligible status through [`RetryableError`].

use std::{fmt, future::Future, time::Duration};

use crate::{error::MaxRetriesReached, RelayError};

/// Exposes the HTTP status carried by a failure, if any.
pub trait RetryableError {
    /// Status attached directly to the error.
    fn status(&self) -> Option<u16>;

    /// Status of a response nested inside the error.
    fn response_status(&self) -> Option<u16> {
        None
    }

    /// Top-level status, falling back to the nested response status.
    ///
    /// A zero status counts as absent.
    fn failure_status(&self) -> Option<u16> {
        self.status()
            .filter(|status| *status != 0)
            .or_else(|| self.response_status().filter(|status| *status != 0))
    }
}

impl RetryableError for RelayError {
    fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } | Self::RedirectRejected { status, .. } => Some(*status),
            Self::Transport(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }
}

/// Classification of one failed attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// HTTP 429.
    RateLimited,
    /// HTTP 5xx.
    ServerError,
    /// No status at all; treated as a network-level failure.
    Network,
    /// Any other status.
    Fatal,
}

impl FailureKind {
    pub fn classify(status: Option<u16>) -> Self {
        match status {
            None => Self::Network,
            Some(429) => Self::RateLimited,
            Some(500..=599) => Self::ServerError,
            Some(_) => Self::Fatal,
        }
    }

    pub fn is_transient(self) -> bool {
        !matches!(self, Self::Fatal)
    }
}

/// Attempt bound and exponential backoff schedule.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Wait after the first failed attempt, in milliseconds.
    pub initial_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_500,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            initial_delay_ms,
        }
    }

    /// Wait inserted after failed attempt `attempt` (1-indexed):
    /// `initial_delay_ms * 2^(attempt - 1)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63);
        let multiplier = 1u64 << exp;
        Duration::from_millis(self.initial_delay_ms.saturating_mul(multiplier))
    }

    /// Runs `operation` until it succeeds, fails fatally, or attempts run out.
    pub async fn run<T, E, Op, Fut>(&self, operation: Op) -> Result<T, E>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + From<MaxRetriesReached> + fmt::Display,
    {
        self.run_with_sleep(operation, tokio::time::sleep).await
    }

    /// Same as [`RetryPolicy::run`] with a caller-supplied wait primitive.
    pub async fn run_with_sleep<T, E, Op, Fut, S, SFut>(
        &self,
        mut operation: Op,
        mut sleep: S,
    ) -> Result<T, E>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + From<MaxRetriesReached> + fmt::Display,
        S: FnMut(Duration) -> SFut,
        SFut: Future<Output = ()>,
    {
        let mut last_error: Option<E> = None;

        for attempt in 1..=self.max_attempts {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let status = error.failure_status();
            let kind = FailureKind::classify(status);

            if attempt == self.max_attempts || !kind.is_transient() {
                #[cfg(feature = "tracing")]
                tracing::error!(attempt, ?status, "final attempt failed: {error}");
                return Err(error);
            }

            let delay = self.delay_for_attempt(attempt);

            #[cfg(feature = "tracing")]
            tracing::warn!(
                "call failed (attempt {attempt}/{}), status: {}, retrying in {} ms",
                self.max_attempts,
                status.map_or_else(|| "network error".to_owned(), |s| s.to_string()),
                delay.as_millis()
            );

            last_error = Some(error);
            sleep(delay).await;
        }

        Err(last_error.unwrap_or_else(|| MaxRetriesReached.into()))
    }
}

/// Runs `operation` under a [`RetryPolicy`] built from the given bounds.
pub async fn with_retry<T, E, Op, Fut>(
    operation: Op,
    max_attempts: u32,
    initial_delay_ms: u64,
) -> Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError + From<MaxRetriesReached> + fmt::Display,
{
    RetryPolicy::new(max_attempts, initial_delay_ms)
        .run(operation)
        .await
}
