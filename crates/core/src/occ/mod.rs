//! Optimistic concurrency control
//!
//! - [`occ_execute`]: generic single-row compare-and-swap
//! - [`apply_transfers`]: all-or-nothing multi-row quantity changes
//! - [`statements`]: the conditional statements for the versioned tables

pub mod executor;
pub mod statements;
pub mod transfer;

pub use executor::{occ_execute, OccCommit, OccError, OccOptions};
pub use transfer::{adjust_quantity, apply_transfers, update_product_price, TransferError};
