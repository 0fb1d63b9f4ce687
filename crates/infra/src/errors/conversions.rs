//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;
use stockade_core::StoreError;
use stockade_domain::StockadeError;
use tokio::task::JoinError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub StockadeError);

impl From<InfraError> for StockadeError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<StockadeError> for InfraError {
    fn from(value: StockadeError) -> Self {
        InfraError(value)
    }
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → StoreError */
/* -------------------------------------------------------------------------- */

/// Classify a rusqlite failure for the session port.
pub fn store_error(operation: &str, err: SqlError) -> StoreError {
    use rusqlite::ffi::ErrorCode;

    match err {
        SqlError::SqliteFailure(failure, message) => {
            let message = message.unwrap_or_else(|| failure.to_string());
            match failure.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                    StoreError::busy(operation, message)
                }
                ErrorCode::ConstraintViolation => StoreError::constraint(operation, message),
                code => StoreError::backend(
                    operation,
                    format!("sqlite failure {code:?} (code {}): {message}", failure.extended_code),
                ),
            }
        }
        SqlError::FromSqlConversionFailure(_, _, cause) => {
            StoreError::decode(operation, format!("failed to convert sqlite value: {cause}"))
        }
        SqlError::InvalidColumnType(_, name, ty) => {
            StoreError::decode(name, format!("invalid column type: {ty}"))
        }
        SqlError::InvalidParameterName(name) => {
            StoreError::backend(operation, format!("invalid parameter name: {name}"))
        }
        other => StoreError::backend(operation, other),
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(store_error("sqlite", value).into())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → StockadeError */
/* -------------------------------------------------------------------------- */

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(StoreError::Unavailable(value.to_string()).into())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → StockadeError */
/* -------------------------------------------------------------------------- */

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        if value.is_timeout() {
            return InfraError(StockadeError::Network("HTTP request timed out".into()));
        }
        if value.is_connect() {
            return InfraError(StockadeError::Network("HTTP connection failure".into()));
        }
        if value.is_builder() {
            return InfraError(StockadeError::Config(format!("invalid HTTP client setup: {value}")));
        }
        if let Some(status) = value.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));
            return InfraError(match code {
                404 => StockadeError::NotFound(message),
                400..=499 => StockadeError::InvalidInput(message),
                _ => StockadeError::Network(message),
            });
        }
        InfraError(StockadeError::Network(value.to_string()))
    }
}

/// Map a failed `spawn_blocking` join into the domain error.
pub fn map_join_error(err: JoinError) -> StockadeError {
    if err.is_cancelled() {
        StockadeError::Internal("blocking task cancelled".into())
    } else {
        StockadeError::Internal(format!("blocking task failed: {err}"))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
