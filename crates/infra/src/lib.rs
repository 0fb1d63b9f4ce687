//! # Stockade Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - SQLite store (r2d2 pool, sessions, schema) and repositories
//! - The upstream price vendor client
//! - Cache and task queue implementations
//! - Configuration loading and logging initialisation
//! - HTTP boundary error mapping
//!
//! ## Architecture
//! - Implements traits defined in `stockade-core`
//! - Depends on `stockade-common`, `stockade-domain` and `stockade-core`
//! - Contains all "impure" code (I/O, network, runtime)

pub mod cache;
pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod integrations;
pub mod observability;
pub mod tasks;

// Re-export commonly used items
pub use cache::MokaCacheStore;
pub use database::{
    DbManager, SqliteProductRepository, SqliteSession, SqliteStockRepository,
    SqliteWarehouseRepository,
};
pub use errors::InfraError;
pub use http::{ErrorResponse, IntoErrorResponse};
pub use integrations::vendor::{VendorClient, VendorError, VendorSnapshot};
pub use observability::init_tracing;
pub use tasks::{register_price_refresh, InProcessTaskQueue};
