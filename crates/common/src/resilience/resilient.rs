//! Circuit breaker wrapped around a retry loop, with call metrics.
//!
//! The composition order is fixed: the breaker admits the invocation, then
//! the retry policy spends its whole attempt budget inside that single
//! admission. The breaker therefore sees one outcome per external call, and
//! an open breaker stops the call before any attempt is made.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::circuit_breaker::{CircuitBreaker, CircuitOpenError, CircuitSnapshot, Clock, SystemClock};
use super::metrics::{CallMetrics, CallMetricsSnapshot};
use super::retry::{RetryError, RetryPolicy, StopReason};
use crate::error::ErrorClassification;

/// Predicate over an operation error
pub type ErrorPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Terminal outcome of a failed [`ResilientCaller::call`].
#[derive(Debug, Error)]
pub enum ResilientError<E> {
    /// The breaker rejected the call; the operation was never invoked
    #[error(transparent)]
    CircuitOpen(CircuitOpenError),

    /// Every attempt failed with a retryable error
    #[error("retry exhausted after {attempts} attempt(s), {reason}: {last_error}")]
    RetryExhausted {
        attempts: u32,
        reason: StopReason,
        elapsed: Duration,
        #[source]
        last_error: E,
    },

    /// An error that is neither retryable nor excluded; counted as a failure
    #[error("non-retryable failure after {attempts} attempt(s): {source}")]
    NonRetryable {
        attempts: u32,
        #[source]
        source: E,
    },

    /// An excluded error, passed through untouched by breaker and retry
    #[error(transparent)]
    Excluded(E),
}

impl<E> ResilientError<E> {
    /// Attempts made before the call ended (zero when rejected)
    pub fn attempts(&self) -> u32 {
        match self {
            Self::CircuitOpen(_) => 0,
            Self::RetryExhausted { attempts, .. } | Self::NonRetryable { attempts, .. } => {
                *attempts
            }
            Self::Excluded(_) => 1,
        }
    }

    /// The underlying operation error, if the operation ran
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            Self::CircuitOpen(_) => None,
            Self::RetryExhausted { last_error, .. } => Some(last_error),
            Self::NonRetryable { source, .. } | Self::Excluded(source) => Some(source),
        }
    }
}

impl<E: ErrorClassification> ErrorClassification for ResilientError<E> {
    fn is_retryable(&self) -> bool {
        match self {
            Self::CircuitOpen(_) | Self::RetryExhausted { .. } => true,
            Self::NonRetryable { source, .. } | Self::Excluded(source) => source.is_retryable(),
        }
    }

    fn severity(&self) -> crate::error::ErrorSeverity {
        match self {
            Self::CircuitOpen(_) => crate::error::ErrorSeverity::Warning,
            Self::RetryExhausted { last_error, .. } => last_error.severity(),
            Self::NonRetryable { source, .. } | Self::Excluded(source) => source.severity(),
        }
    }

    fn is_critical(&self) -> bool {
        self.operation_error().is_some_and(ErrorClassification::is_critical)
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::CircuitOpen(open) => open.retry_after,
            _ => self.operation_error().and_then(ErrorClassification::retry_after),
        }
    }
}

/// Retry settings as reported in a [`ResilientSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub jitter_ms: u64,
    pub max_delay_ms: u64,
    pub budget_ms: Option<u64>,
}

/// Breaker state, metrics and retry settings at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResilientSnapshot {
    pub breaker: CircuitSnapshot,
    pub metrics: CallMetricsSnapshot,
    pub retry: RetrySettings,
}

/// Composes a shared [`CircuitBreaker`] around a [`RetryPolicy`].
///
/// Errors are sorted by two predicates: `exclude_if` marks caller-side
/// errors that bypass both retry and breaker accounting, `retry_if` marks
/// transient errors worth another attempt. By default nothing is excluded and
/// everything else is retried.
pub struct ResilientCaller<E, C: Clock = SystemClock> {
    breaker: Arc<CircuitBreaker<C>>,
    retry: RetryPolicy,
    metrics: Arc<CallMetrics>,
    retry_if: ErrorPredicate<E>,
    exclude_if: ErrorPredicate<E>,
}

impl<E, C: Clock> fmt::Debug for ResilientCaller<E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientCaller")
            .field("breaker", &self.breaker)
            .field("retry", &self.retry)
            .field("metrics", &self.metrics.snapshot())
            .finish_non_exhaustive()
    }
}

impl<E, C> ResilientCaller<E, C>
where
    E: std::error::Error + Send + Sync + 'static,
    C: Clock,
{
    /// Wrap `breaker` around `retry`. State transitions of the breaker are
    /// counted in this caller's metrics from now on.
    pub fn new(breaker: Arc<CircuitBreaker<C>>, retry: RetryPolicy) -> Self {
        let metrics = Arc::new(CallMetrics::new());
        let observer = Arc::clone(&metrics);
        breaker.subscribe(Arc::new(move |_| observer.record_state_change()));

        Self {
            breaker,
            retry,
            metrics,
            retry_if: Arc::new(|_| true),
            exclude_if: Arc::new(|_| false),
        }
    }

    /// Only retry errors matching `predicate`.
    #[must_use]
    pub fn retry_if<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.retry_if = Arc::new(predicate);
        self
    }

    /// Pass errors matching `predicate` straight through.
    #[must_use]
    pub fn exclude_if<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.exclude_if = Arc::new(predicate);
        self
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker<C>> {
        &self.breaker
    }

    pub fn metrics(&self) -> &CallMetrics {
        &self.metrics
    }

    /// Run `operation` under breaker and retry, returning the value and the
    /// number of attempts it took.
    #[instrument(skip_all, fields(breaker = %self.breaker.name()))]
    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<(T, u32), ResilientError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.metrics.record_call();

        let permit = match self.breaker.try_acquire() {
            Ok(permit) => permit,
            Err(open) => {
                self.metrics.record_rejected();
                return Err(ResilientError::CircuitOpen(open));
            }
        };

        let exclude_if = &self.exclude_if;
        let retry_if = &self.retry_if;
        let outcome = self.retry.run(operation, |error| !exclude_if(error) && retry_if(error)).await;

        match outcome {
            Ok((value, attempts)) => {
                permit.success();
                self.metrics.record_success(attempts);
                Ok((value, attempts))
            }
            Err(RetryError::NonRetryable { attempt, source }) if exclude_if(&source) => {
                permit.ignore();
                self.metrics.record_excluded(attempt);
                debug!(attempts = attempt, error = %source, "excluded error passed through");
                Err(ResilientError::Excluded(source))
            }
            Err(RetryError::NonRetryable { attempt, source }) => {
                permit.failure();
                self.metrics.record_failure(attempt);
                warn!(attempts = attempt, error = %source, "non-retryable failure");
                Err(ResilientError::NonRetryable { attempts: attempt, source })
            }
            Err(RetryError::Exhausted { attempts, elapsed, reason, last_error }) => {
                permit.failure();
                self.metrics.record_failure(attempts);
                Err(ResilientError::RetryExhausted { attempts, reason, elapsed, last_error })
            }
        }
    }

    pub fn snapshot(&self) -> ResilientSnapshot {
        let retry = self.retry.config();
        ResilientSnapshot {
            breaker: self.breaker.snapshot(),
            metrics: self.metrics.snapshot(),
            retry: RetrySettings {
                max_attempts: retry.max_attempts,
                base_delay_ms: millis(retry.base_delay),
                multiplier: retry.multiplier,
                jitter_ms: millis(retry.jitter),
                max_delay_ms: millis(retry.max_delay),
                budget_ms: retry.budget.map(millis),
            },
        }
    }

    /// Close the breaker (admin/test action). Metrics are kept; use
    /// [`CallMetrics::reset`] to clear them.
    pub fn reset(&self) {
        self.breaker.reset();
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
