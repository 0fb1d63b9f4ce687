//! Port interfaces consumed by the core
//!
//! Implemented in `stockade-infra`; mocked in tests.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use stockade_domain::{
    NewProduct, NewStockItem, Page, PriceQuote, Product, ProductStockTotal, Result, StockFilter,
    StockItem, TransferOperation, Version, WarehouseStockTotal,
};
use tracing::debug;
use uuid::Uuid;

/// Key-value cache used for read-through caching.
///
/// Implementations swallow their own failures: a broken cache degrades to
/// cache misses, never to a failed request.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<serde_json::Value>;

    fn set(&self, key: &str, value: serde_json::Value, ttl: Duration);

    fn delete(&self, key: &str);
}

/// Typed read from a cache; undecodable entries count as misses.
pub fn cache_get<T: DeserializeOwned>(cache: &dyn CacheStore, key: &str) -> Option<T> {
    let value = cache.get(key)?;
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(err) => {
            debug!(key, error = %err, "Discarding undecodable cache entry");
            cache.delete(key);
            None
        }
    }
}

/// Typed write to a cache; serialization failures are logged and skipped.
pub fn cache_set<T: Serialize>(cache: &dyn CacheStore, key: &str, value: &T, ttl: Duration) {
    match serde_json::to_value(value) {
        Ok(json) => cache.set(key, json, ttl),
        Err(err) => debug!(key, error = %err, "Skipping cache write"),
    }
}

/// Handle returned by [`TaskQueue::enqueue`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskHandle {
    pub id: Uuid,
    pub name: String,
}

impl TaskHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { id: Uuid::new_v4(), name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum TaskOutcome {
    Completed(serde_json::Value),
    Failed(String),
}

/// Asynchronous task submission.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Schedule `task_name` with JSON arguments.
    fn enqueue(&self, task_name: &str, args: serde_json::Value) -> Result<TaskHandle>;

    /// Wait for a scheduled task to finish.
    async fn wait(&self, handle: &TaskHandle) -> Result<TaskOutcome>;
}

/// Upstream source of product prices.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_price(&self, product_id: i64) -> Result<PriceQuote>;
}

/// Stock items persisted with OCC versioning.
#[async_trait]
pub trait StockRepository: Send + Sync {
    async fn create(&self, item: NewStockItem) -> Result<StockItem>;

    async fn get(&self, item_id: i64) -> Result<Option<StockItem>>;

    async fn list(&self, filter: StockFilter) -> Result<Page<StockItem>>;

    /// Add `delta` (possibly negative) to one item's quantity.
    async fn adjust_quantity(
        &self,
        item_id: i64,
        delta: i64,
        expected_version: Option<Version>,
    ) -> Result<StockItem>;

    /// Apply a batch of changes atomically.
    async fn transfer(&self, ops: Vec<TransferOperation>) -> Result<Vec<StockItem>>;

    async fn delete(&self, item_id: i64) -> Result<bool>;

    async fn product_stock_totals(&self) -> Result<Vec<ProductStockTotal>>;

    async fn warehouse_stock_totals(&self) -> Result<Vec<WarehouseStockTotal>>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn create(&self, product: NewProduct) -> Result<Product>;

    async fn get(&self, product_id: i64) -> Result<Option<Product>>;

    async fn update_price(
        &self,
        product_id: i64,
        price: f64,
        expected_version: Option<Version>,
    ) -> Result<Product>;

    /// Quantity summed over every warehouse.
    async fn total_stock(&self, product_id: i64) -> Result<i64>;
}
