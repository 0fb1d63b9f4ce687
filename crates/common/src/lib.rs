//! Modular common utilities shared across Stockade crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: error vocabulary and classification
//! - `runtime`: resilience primitives (circuit breaker, retry, resilient
//!   caller, call metrics)
//! - `observability`: optional tracing (implied by `runtime`)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use error::{ErrorClassification, ErrorSeverity};
#[cfg(feature = "runtime")]
pub use resilience::{
    CallMetrics, CallMetricsSnapshot, CircuitBreaker, CircuitBreakerConfig,
    CircuitBreakerConfigBuilder, CircuitOpenError, CircuitSnapshot, CircuitState, Clock,
    ConfigError, MockClock, ResilientCaller, ResilientError, ResilientSnapshot, RetryConfig,
    RetryConfigBuilder, RetryError, RetryPolicy, StopReason, SystemClock,
};
