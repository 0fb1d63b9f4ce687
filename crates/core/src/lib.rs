//! # Stockade Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - The session port every relational store implements
//! - The OCC executor and the batch transfer coordinator built on it
//! - Port/adapter interfaces (traits) for cache, task queue, price source
//!   and repositories
//! - The background price refresh use case
//!
//! ## Architecture Principles
//! - Only depends on `stockade-common` and `stockade-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod occ;
pub mod ports;
pub mod pricing;
pub mod store;

pub use occ::{
    adjust_quantity, apply_transfers, occ_execute, update_product_price, OccCommit, OccError,
    OccOptions, TransferError,
};
pub use ports::{
    cache_get, cache_set, CacheStore, PriceSource, ProductRepository, StockRepository,
    TaskHandle, TaskOutcome, TaskQueue,
};
pub use pricing::{PriceRefreshRequest, PriceRefreshService};
pub use store::{Row, Session, SqlValue, Statement, StoreError};
