//! Session port over a relational store
//!
//! The OCC executor and the transfer coordinator only ever talk to a
//! [`Session`]: parameterized statements in, rows and affected-row counts
//! out, plus explicit commit/rollback. Infra provides the SQLite
//! implementation; tests provide in-memory ones.

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use stockade_common::{ErrorClassification, ErrorSeverity};
use stockade_domain::StockadeError;
use thiserror::Error;

/// Failure reported by a session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not take the write lock before its busy timeout
    #[error("store busy during '{operation}': {message}")]
    Busy { operation: String, message: String },

    #[error("store error during '{operation}': {message}")]
    Backend { operation: String, message: String },

    /// A foreign key, uniqueness or CHECK constraint rejected the write
    #[error("constraint violated during '{operation}': {message}")]
    Constraint { operation: String, message: String },

    /// A row came back without the expected column or with the wrong type
    #[error("cannot decode column '{column}': {message}")]
    Decode { column: String, message: String },

    #[error("no connection available: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn backend(operation: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Backend { operation: operation.into(), message: message.to_string() }
    }

    pub fn busy(operation: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Busy { operation: operation.into(), message: message.to_string() }
    }

    pub fn constraint(operation: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Constraint { operation: operation.into(), message: message.to_string() }
    }

    pub fn decode(column: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Decode { column: column.into(), message: message.to_string() }
    }
}

impl ErrorClassification for StoreError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy { .. } | Self::Unavailable(_))
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Busy { .. } | Self::Constraint { .. } => ErrorSeverity::Warning,
            Self::Backend { .. } | Self::Unavailable(_) => ErrorSeverity::Error,
            Self::Decode { .. } => ErrorSeverity::Critical,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl From<StoreError> for StockadeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Constraint { message, .. } => StockadeError::InvalidInput(message),
            other => StockadeError::Database(other.to_string()),
        }
    }
}

/// Value bound to, or read from, a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Real(v) => Some(*v),
            #[allow(clippy::cast_precision_loss)]
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Parameterized statement with named (`:name`) parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Short stable name used in logs, e.g. `stock_item.apply_delta`
    pub label: &'static str,
    pub sql: Cow<'static, str>,
    pub params: Vec<(&'static str, SqlValue)>,
}

impl Statement {
    pub fn new(label: &'static str, sql: impl Into<Cow<'static, str>>) -> Self {
        Self { label, sql: sql.into(), params: Vec::new() }
    }

    #[must_use]
    pub fn bind(mut self, name: &'static str, value: impl Into<SqlValue>) -> Self {
        self.params.push((name, value.into()));
        self
    }

    pub fn param(&self, name: &str) -> Option<&SqlValue> {
        self.params.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }
}

/// One result row, columns addressed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.push(column, value);
        self
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        self.columns.push((column.into(), value.into()));
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns.iter().find(|(name, _)| name == column).map(|(_, v)| v)
    }

    fn require(&self, column: &str) -> Result<&SqlValue, StoreError> {
        self.get(column).ok_or_else(|| StoreError::decode(column, "column missing from row"))
    }

    pub fn get_i64(&self, column: &str) -> Result<i64, StoreError> {
        self.require(column)?
            .as_i64()
            .ok_or_else(|| StoreError::decode(column, "expected integer"))
    }

    /// Integer column that may be NULL.
    pub fn get_opt_i64(&self, column: &str) -> Result<Option<i64>, StoreError> {
        match self.require(column)? {
            SqlValue::Null => Ok(None),
            SqlValue::Integer(v) => Ok(Some(*v)),
            _ => Err(StoreError::decode(column, "expected integer or NULL")),
        }
    }

    pub fn get_f64(&self, column: &str) -> Result<f64, StoreError> {
        self.require(column)?.as_f64().ok_or_else(|| StoreError::decode(column, "expected real"))
    }

    pub fn get_string(&self, column: &str) -> Result<String, StoreError> {
        match self.require(column)? {
            SqlValue::Text(v) => Ok(v.clone()),
            _ => Err(StoreError::decode(column, "expected text")),
        }
    }

    pub fn get_opt_string(&self, column: &str) -> Result<Option<String>, StoreError> {
        match self.get(column) {
            None | Some(SqlValue::Null) => Ok(None),
            Some(SqlValue::Text(v)) => Ok(Some(v.clone())),
            Some(_) => Err(StoreError::decode(column, "expected text or NULL")),
        }
    }
}

/// A unit of work against the store.
///
/// The first statement opens a transaction; `commit` or `rollback` closes it.
/// Implementations must roll back an open transaction when dropped.
pub trait Session {
    /// Run a query and return every row.
    fn query(&mut self, statement: &Statement) -> Result<Vec<Row>, StoreError>;

    /// Run a write and return the number of affected rows.
    fn execute(&mut self, statement: &Statement) -> Result<usize, StoreError>;

    fn commit(&mut self) -> Result<(), StoreError>;

    fn rollback(&mut self) -> Result<(), StoreError>;

    /// Run a query expected to return at most one row.
    fn query_row(&mut self, statement: &Statement) -> Result<Option<Row>, StoreError> {
        Ok(self.query(statement)?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_binding() {
        let stmt = Statement::new("t", "SELECT 1 WHERE id = :id").bind(":id", 7_i64);
        assert_eq!(stmt.param(":id"), Some(&SqlValue::Integer(7)));
        assert_eq!(stmt.param(":missing"), None);
    }

    #[test]
    fn test_row_accessors() {
        let row = Row::new()
            .with("id", 1_i64)
            .with("version", SqlValue::Null)
            .with("name", "Widget")
            .with("price", 2.5);

        assert_eq!(row.get_i64("id").unwrap(), 1);
        assert_eq!(row.get_opt_i64("version").unwrap(), None);
        assert_eq!(row.get_string("name").unwrap(), "Widget");
        assert!((row.get_f64("price").unwrap() - 2.5).abs() < f64::EPSILON);
        assert_eq!(row.get_opt_string("absent").unwrap(), None);
        assert!(matches!(row.get_i64("name"), Err(StoreError::Decode { .. })));
        assert!(matches!(row.get_i64("absent"), Err(StoreError::Decode { .. })));
    }

    #[test]
    fn test_busy_is_retryable() {
        assert!(StoreError::busy("commit", "database is locked").is_retryable());
        assert!(!StoreError::backend("insert", "constraint").is_retryable());
        let domain: StockadeError = StoreError::backend("insert", "constraint").into();
        assert_eq!(domain.status_code(), 500);
        let domain: StockadeError =
            StoreError::constraint("insert", "FOREIGN KEY constraint failed").into();
        assert_eq!(domain.status_code(), 400);
    }
}
