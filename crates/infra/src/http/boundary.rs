//! Error-to-response mapping for whatever HTTP layer fronts the service.
//!
//! | Error                              | Status            |
//! |------------------------------------|-------------------|
//! | `NotFound`                         | 404               |
//! | `Conflict` (version or underflow)  | 409               |
//! | `InvalidInput`                     | 400               |
//! | `Network`                          | 502               |
//! | circuit open                       | 503               |
//! | retries exhausted / non-retryable  | 502               |
//! | upstream 4xx                       | upstream status   |

use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use stockade_common::ResilientError;
use stockade_domain::StockadeError;

use crate::integrations::vendor::{to_domain_error, VendorError};

/// Status code plus JSON body, ready to hand to a web framework.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub body: Value,
}

impl ErrorResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }
}

pub trait IntoErrorResponse {
    fn into_error_response(self) -> ErrorResponse;
}

impl IntoErrorResponse for StockadeError {
    fn into_error_response(self) -> ErrorResponse {
        let status = self.status_code();
        let mut body = json!({
            "error": error_kind(&self),
            "message": self.to_string(),
        });
        if let StockadeError::Conflict { reason, .. } = &self {
            body["reason"] = json!(reason);
        }
        if status >= 500 {
            tracing::error!(status, error = %self, "request failed");
        }
        ErrorResponse::new(status, body)
    }
}

impl IntoErrorResponse for ResilientError<VendorError> {
    fn into_error_response(self) -> ErrorResponse {
        match self {
            ResilientError::CircuitOpen(open) => ErrorResponse::new(
                503,
                json!({
                    "error": "circuit_open",
                    "message": format!("circuit '{}' is {}", open.snapshot.name, open.snapshot.state),
                    "breaker": open.snapshot,
                    "retry_after_ms": open.retry_after.map(saturating_millis),
                }),
            ),
            ResilientError::RetryExhausted { attempts, reason, last_error, .. } => ErrorResponse::new(
                502,
                json!({
                    "error": "retry_exhausted",
                    "message": reason.to_string(),
                    "attempts": attempts,
                    "last_error": last_error.to_string(),
                }),
            ),
            ResilientError::NonRetryable { attempts, source } => ErrorResponse::new(
                502,
                json!({
                    "error": "upstream_failure",
                    "attempts": attempts,
                    "last_error": source.to_string(),
                }),
            ),
            ResilientError::Excluded(VendorError::Client { status, payload }) => {
                ErrorResponse::new(status, payload)
            }
            other => to_domain_error(&other).into_error_response(),
        }
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn error_kind(err: &StockadeError) -> &'static str {
    match err {
        StockadeError::NotFound(_) => "not_found",
        StockadeError::Conflict { .. } => "conflict",
        StockadeError::InvalidInput(_) => "invalid_input",
        StockadeError::Database(_) => "database",
        StockadeError::Config(_) => "config",
        StockadeError::Network(_) => "network",
        StockadeError::Internal(_) => "internal",
    }
}
