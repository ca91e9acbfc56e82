//! Retry with exponential backoff.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::Classify;
use parking_lot::Mutex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::error::{ConfigError, ConfigResult};

/// Why a retried operation gave up.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error.
    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    Exhausted { last_error: E, attempts: u32 },

    /// The operation failed with an error that must not be retried.
    #[error("Non-retryable failure on attempt {attempts}: {source}")]
    NonRetryable { source: E, attempts: u32 },

    /// Shutdown was requested while waiting to retry.
    #[error("Retry cancelled after {attempts} attempts: {last_error}")]
    Cancelled { last_error: E, attempts: u32 },
}

impl<E> RetryError<E> {
    /// Number of attempts made.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. }
            | RetryError::NonRetryable { attempts, .. }
            | RetryError::Cancelled { attempts, .. } => *attempts,
        }
    }

    /// The last error the operation returned.
    pub fn last_error(&self) -> &E {
        match self {
            RetryError::Exhausted { last_error, .. } | RetryError::Cancelled { last_error, .. } => {
                last_error
            }
            RetryError::NonRetryable { source, .. } => source,
        }
    }

    pub fn into_last_error(self) -> E {
        match self {
            RetryError::Exhausted { last_error, .. } | RetryError::Cancelled { last_error, .. } => {
                last_error
            }
            RetryError::NonRetryable { source, .. } => source,
        }
    }
}

/// Backoff schedule.
///
/// The delay before attempt `n + 1` is
/// `min(initial_delay * multiplier^(n - 1), max_delay)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(2000),
            multiplier: 2.0,
            max_delay: Duration::from_millis(10_000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            ..Self::default()
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("max_attempts", "must be at least 1"));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::invalid(
                "multiplier",
                format!("must be a finite value >= 1.0, got {}", self.multiplier),
            ));
        }
        if self.max_delay < self.initial_delay {
            return Err(ConfigError::invalid(
                "max_delay",
                "must not be shorter than initial_delay",
            ));
        }
        Ok(())
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }
}

/// Something that can wait.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records requested delays and returns immediately.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().push(duration);
    }
}

/// Runs an operation until it succeeds, fails permanently, or runs out of
/// attempts.
///
/// Parking a terminally failed operation somewhere is the caller's job.
pub struct RetryExecutor<S: Sleeper = TokioSleeper> {
    name: String,
    policy: RetryPolicy,
    sleeper: S,
    cancel: Option<CancellationToken>,
}

impl RetryExecutor<TokioSleeper> {
    pub fn new(name: impl Into<String>, policy: RetryPolicy) -> Self {
        Self::with_sleeper(name, policy, TokioSleeper)
    }
}

impl<S: Sleeper> RetryExecutor<S> {
    pub fn with_sleeper(name: impl Into<String>, policy: RetryPolicy, sleeper: S) -> Self {
        Self {
            name: name.into(),
            policy,
            sleeper,
            cancel: None,
        }
    }

    /// Aborts backoff waits when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// Runs `operation`, passing it the 1-based attempt number.
    pub async fn execute<T, E, F, Fut, P>(
        &self,
        mut operation: F,
        is_retryable: P,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        P: Fn(&E) -> bool,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            metrics::counter!("retry_attempts_total", "operation" => self.name.clone())
                .increment(1);

            let error = match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(operation = %self.name, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if !is_retryable(&error) {
                tracing::warn!(operation = %self.name, attempt, error = %error, "Non-retryable failure");
                return Err(RetryError::NonRetryable {
                    source: error,
                    attempts: attempt,
                });
            }

            if attempt >= max_attempts {
                tracing::error!(operation = %self.name, attempts = attempt, error = %error, "Retries exhausted");
                metrics::counter!("retry_exhausted_total", "operation" => self.name.clone())
                    .increment(1);
                return Err(RetryError::Exhausted {
                    last_error: error,
                    attempts: attempt,
                });
            }

            let delay = self.policy.delay_for(attempt);
            tracing::warn!(
                operation = %self.name,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Attempt failed, retrying"
            );

            if let Some(token) = &self.cancel {
                tokio::select! {
                    _ = token.cancelled() => {
                        return Err(RetryError::Cancelled {
                            last_error: error,
                            attempts: attempt,
                        });
                    }
                    _ = self.sleeper.sleep(delay) => {}
                }
            } else {
                self.sleeper.sleep(delay).await;
            }

            attempt += 1;
        }
    }

    /// Like [`execute`](Self::execute), retrying only transient errors.
    pub async fn execute_classified<T, E, F, Fut>(&self, operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display + Classify,
    {
        self.execute(operation, |e: &E| e.is_transient()).await
    }
}
