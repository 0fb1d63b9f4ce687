//! Database implementations

pub mod manager;
pub mod product_repository;
pub mod session;
pub mod stock_repository;
pub mod warehouse_repository;

pub use manager::*;
pub use product_repository::*;
pub use session::*;
pub use stock_repository::*;
pub use warehouse_repository::*;
