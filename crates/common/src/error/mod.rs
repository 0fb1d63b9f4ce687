//! Error classification shared by every Stockade crate.
//!
//! Module errors stay module-specific (`StoreError`, `VendorError`, ...) and
//! implement [`ErrorClassification`] so resilience primitives and logging can
//! ask them the same questions:
//!
//! ```rust,ignore
//! impl ErrorClassification for VendorError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, Self::Server { .. } | Self::Timeout(_))
//!     }
//!     // ...
//! }
//! ```

use std::fmt;
use std::time::Duration;

/// Error classification trait for consistent error handling across modules
///
/// Resilience primitives use `is_retryable` as their default retry
/// predicate, and logging uses `severity` to pick a level.
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient issues that may succeed if attempted
    /// again, such as network timeouts or temporary upstream unavailability.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool;

    /// Get the suggested retry delay if applicable
    ///
    /// Returns `Some(Duration)` when a specific delay is recommended (for
    /// example from a `Retry-After` header).
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}
