//! Cache implementations

pub mod moka_store;

pub use moka_store::MokaCacheStore;
