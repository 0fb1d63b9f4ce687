//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a conditional write was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    /// Another writer bumped the version first
    VersionMismatch,
    /// The write would have driven a quantity below zero
    Underflow,
}

impl std::fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VersionMismatch => write!(f, "version mismatch"),
            Self::Underflow => write!(f, "insufficient quantity"),
        }
    }
}

/// Main error type for Stockade
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum StockadeError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict ({reason}): {message}")]
    Conflict { reason: ConflictReason, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StockadeError {
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{entity} {id}"))
    }

    pub fn version_conflict(message: impl Into<String>) -> Self {
        Self::Conflict { reason: ConflictReason::VersionMismatch, message: message.into() }
    }

    pub fn underflow(message: impl Into<String>) -> Self {
        Self::Conflict { reason: ConflictReason::Underflow, message: message.into() }
    }

    /// HTTP status the boundary layer reports for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Conflict { .. } => 409,
            Self::InvalidInput(_) => 400,
            Self::Network(_) => 502,
            Self::Database(_) | Self::Config(_) | Self::Internal(_) => 500,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Result type alias for Stockade operations
pub type Result<T> = std::result::Result<T, StockadeError>;
