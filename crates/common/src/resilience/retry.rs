//! Bounded retry with exponential backoff, uniform jitter and an optional
//! wall-clock budget.
//!
//! The delay after the `i`-th failed attempt (0-indexed) is
//! `base_delay * multiplier^i`, capped at `max_delay`, shifted by a uniform
//! offset in `[-jitter, +jitter]` and finally clamped to
//! `[0, remaining_budget]`. Only errors accepted by the retry predicate are
//! retried; anything else is returned immediately.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::circuit_breaker::{ConfigError, ConfigResult};
use crate::error::ErrorClassification;

/// Why a retry loop gave up on a retryable error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `max_attempts` calls were made
    AttemptsExhausted,
    /// The time budget ran out before another attempt could start
    BudgetExceeded,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AttemptsExhausted => write!(f, "attempts exhausted"),
            Self::BudgetExceeded => write!(f, "time budget exceeded"),
        }
    }
}

/// Errors that can occur during retry operations
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error
    #[error("retry gave up after {attempts} attempt(s), {reason}: {last_error}")]
    Exhausted {
        attempts: u32,
        elapsed: Duration,
        reason: StopReason,
        #[source]
        last_error: E,
    },

    /// The operation failed with an error the predicate refused to retry
    #[error("non-retryable failure on attempt {attempt}: {source}")]
    NonRetryable {
        attempt: u32,
        #[source]
        source: E,
    },
}

impl<E> RetryError<E> {
    /// Number of attempts made before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
            Self::NonRetryable { attempt, .. } => *attempt,
        }
    }

    /// The last error returned by the operation
    pub fn last_error(&self) -> &E {
        match self {
            Self::Exhausted { last_error, .. } => last_error,
            Self::NonRetryable { source, .. } => source,
        }
    }

    /// Consume the error and return the last error returned by the operation
    pub fn into_last_error(self) -> E {
        match self {
            Self::Exhausted { last_error, .. } => last_error,
            Self::NonRetryable { source, .. } => source,
        }
    }
}

/// Result type for retry operations: the value and the attempts it took
pub type RetryResult<T, E> = Result<(T, u32), RetryError<E>>;

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of calls, including the first
    pub max_attempts: u32,
    /// Delay after the first failure
    pub base_delay: Duration,
    /// Growth factor applied per failed attempt
    pub multiplier: f64,
    /// Upper bound of the uniform offset added to each delay
    pub jitter: Duration,
    /// Cap on a single unjittered delay
    pub max_delay: Duration,
    /// Maximum total time from the first call, if any
    pub budget: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            multiplier: 2.0,
            jitter: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            budget: Some(Duration::from_secs(5)),
        }
    }
}

impl RetryConfig {
    /// Create a configuration builder
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("max_attempts must be greater than 0"));
        }

        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::invalid("multiplier must be a finite value >= 1.0"));
        }

        if self.budget.is_some_and(|budget| budget.is_zero()) {
            return Err(ConfigError::invalid("budget must be greater than 0 when set"));
        }

        Ok(())
    }

    /// Unjittered delay after the `retry_index`-th failure (0-indexed).
    pub fn backoff(&self, retry_index: u32) -> Duration {
        let exponent = i32::try_from(retry_index).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
    }

    /// Backoff with a uniform offset in `[-jitter, +jitter]`, floored at zero.
    pub fn jittered_backoff<R: Rng + ?Sized>(&self, retry_index: u32, rng: &mut R) -> Duration {
        let delay = self.backoff(retry_index).as_secs_f64();
        let jitter = self.jitter.as_secs_f64();
        let offset = if jitter > 0.0 { rng.gen_range(-jitter..=jitter) } else { 0.0 };
        Duration::try_from_secs_f64((delay + offset).max(0.0)).unwrap_or(Duration::ZERO)
    }
}

/// Builder for RetryConfig with fluent API
#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self { config: RetryConfig::default() }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.config.base_delay = delay;
        self
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.config.multiplier = multiplier;
        self
    }

    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.config.jitter = jitter;
        self
    }

    pub fn no_jitter(mut self) -> Self {
        self.config.jitter = Duration::ZERO;
        self
    }

    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.config.max_delay = max_delay;
        self
    }

    pub fn budget(mut self, budget: Duration) -> Self {
        self.config.budget = Some(budget);
        self
    }

    pub fn unlimited_time(mut self) -> Self {
        self.config.budget = None;
        self
    }

    pub fn build(self) -> ConfigResult<RetryConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Retry executor for one validated [`RetryConfig`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Retry errors that classify themselves as retryable.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> RetryResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ErrorClassification + fmt::Display,
    {
        self.run(operation, |error: &E| error.is_retryable()).await
    }

    /// Invoke `operation` until it succeeds, `retry_if` rejects an error,
    /// attempts run out or the budget is spent.
    ///
    /// Returns the value together with the number of attempts used.
    #[instrument(skip_all, fields(max_attempts = self.config.max_attempts))]
    pub async fn run<F, Fut, T, E, P>(&self, mut operation: F, retry_if: P) -> RetryResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: fmt::Display,
    {
        let start = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let error = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "operation succeeded after retry");
                    }
                    return Ok((value, attempt));
                }
                Err(error) => error,
            };

            if !retry_if(&error) {
                debug!(attempt, error = %error, "error is not retryable");
                return Err(RetryError::NonRetryable { attempt, source: error });
            }

            let elapsed = start.elapsed();
            if attempt >= self.config.max_attempts {
                warn!(attempts = attempt, error = %error, "retry attempts exhausted");
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    elapsed,
                    reason: StopReason::AttemptsExhausted,
                    last_error: error,
                });
            }

            let mut delay = self.config.jittered_backoff(attempt - 1, &mut rand::thread_rng());
            if let Some(budget) = self.config.budget {
                let remaining = budget.saturating_sub(elapsed);
                if remaining.is_zero() {
                    warn!(attempts = attempt, error = %error, "retry budget exhausted");
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        elapsed,
                        reason: StopReason::BudgetExceeded,
                        last_error: error,
                    });
                }
                delay = delay.min(remaining);
            }

            warn!(
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "operation failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
