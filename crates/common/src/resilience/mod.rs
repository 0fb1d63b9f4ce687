//! Resilience patterns for calling unreliable upstream dependencies
//!
//! - **Circuit Breaker**: per-resource failure/success state machine that
//!   stops calling a dependency once it is clearly unhealthy
//! - **Retry**: bounded exponential backoff with uniform jitter and an
//!   optional time budget
//! - **Resilient Caller**: a breaker wrapped around a retry loop, with
//!   thread-safe call metrics
//!
//! Everything here is generic over the operation's error type; domain crates
//! decide which errors are retryable and which bypass the breaker.

pub mod circuit_breaker;
pub mod metrics;
pub mod resilient;
pub mod retry;

// Re-export circuit breaker types
pub use circuit_breaker::{
    CallPermit, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder,
    CircuitOpenError, CircuitSnapshot, CircuitState, Clock, ConfigError, ConfigResult, MockClock,
    StateChange, StateChangeListener, SystemClock,
};
// Re-export metrics types
pub use metrics::{CallMetrics, CallMetricsSnapshot};
// Re-export resilient caller types
pub use resilient::{ErrorPredicate, ResilientCaller, ResilientError, ResilientSnapshot, RetrySettings};
// Re-export retry types
pub use retry::{RetryConfig, RetryConfigBuilder, RetryError, RetryPolicy, RetryResult, StopReason};
