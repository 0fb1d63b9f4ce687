//! # Stockade Domain
//!
//! Business domain types and models for Stockade.
//!
//! This crate contains:
//! - Inventory types (StockItem, TransferOperation, Version, etc.)
//! - Product and vendor price types
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Domain constants (cache keys, TTLs)
//!
//! ## Architecture
//! - No dependencies on other Stockade crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
