//! Inventory records and transfer operations

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::errors::{Result, StockadeError};

/// Optimistic concurrency token carried by every mutable row.
///
/// A missing (NULL) column reads as version 0. Versions only move forward,
/// one step per successful conditional write.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(pub i64);

impl Version {
    pub const INITIAL: Version = Version(0);

    pub fn from_column(value: Option<i64>) -> Self {
        Self(value.unwrap_or(0))
    }

    pub fn get(self) -> i64 {
        self.0
    }

    /// Version a successful write stamps on the row.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Quantity of one product held in one warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockItem {
    pub id: i64,
    pub product_id: i64,
    pub warehouse_id: i64,
    pub quantity: i64,
    pub version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<String>,
}

/// Payload for creating a stock item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStockItem {
    pub product_id: i64,
    pub warehouse_id: i64,
    #[serde(default)]
    pub quantity: i64,
}

impl NewStockItem {
    pub fn validate(&self) -> Result<()> {
        if self.product_id <= 0 || self.warehouse_id <= 0 {
            return Err(StockadeError::InvalidInput(
                "product_id and warehouse_id must be positive".to_string(),
            ));
        }
        if self.quantity < 0 {
            return Err(StockadeError::InvalidInput(format!(
                "quantity must not be negative, got {}",
                self.quantity
            )));
        }
        Ok(())
    }
}

/// Search filters and pagination for listing stock items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StockFilter {
    pub warehouse_id: Option<i64>,
    pub product_id: Option<i64>,
    pub min_qty: Option<i64>,
    pub max_qty: Option<i64>,
    /// 1-based page number
    pub page: u32,
    pub page_size: u32,
}

impl Default for StockFilter {
    fn default() -> Self {
        Self {
            warehouse_id: None,
            product_id: None,
            min_qty: None,
            max_qty: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl StockFilter {
    pub fn validate(&self) -> Result<()> {
        if self.page == 0 {
            return Err(StockadeError::InvalidInput("page starts at 1".to_string()));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(StockadeError::InvalidInput(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        if let (Some(min), Some(max)) = (self.min_qty, self.max_qty) {
            if min > max {
                return Err(StockadeError::InvalidInput(format!(
                    "min_qty {min} exceeds max_qty {max}"
                )));
            }
        }
        Ok(())
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.page_size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }
}

/// One page of results plus the unpaged total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub items: Vec<T>,
}

/// Stock summed over all warehouses for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStockTotal {
    pub product_id: i64,
    pub product_name: String,
    pub total_quantity: i64,
}

/// Stock summed over all products for one warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseStockTotal {
    pub warehouse_id: i64,
    pub warehouse_name: String,
    pub total_quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: i64,
    pub name: String,
    pub version: Version,
}

/// Signed quantity change for one stock item within a transfer batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOperation {
    pub item_id: i64,
    pub delta: i64,
}

impl TransferOperation {
    pub fn new(item_id: i64, delta: i64) -> Self {
        Self { item_id, delta }
    }

    /// Quantity the row must already hold for this operation to apply.
    ///
    /// `None` for non-negative deltas, which cannot underflow.
    pub fn required_quantity(&self) -> Option<i64> {
        (self.delta < 0).then(|| self.delta.saturating_neg())
    }
}

/// Sum deltas per item and drop the ones that cancel out.
///
/// The result is ordered by `item_id`, so concurrent batches touching the
/// same rows always write them in the same order.
///
/// # Errors
/// Returns `StockadeError::InvalidInput` when the batch is empty, names a
/// non-positive item id, overflows, or nets out to no change at all.
pub fn aggregate_transfers(ops: &[TransferOperation]) -> Result<Vec<TransferOperation>> {
    if ops.is_empty() {
        return Err(StockadeError::InvalidInput("transfer batch is empty".to_string()));
    }

    let mut totals: BTreeMap<i64, i64> = BTreeMap::new();
    for op in ops {
        if op.item_id <= 0 {
            return Err(StockadeError::InvalidInput(format!(
                "invalid item_id {} in transfer batch",
                op.item_id
            )));
        }
        let total = totals.entry(op.item_id).or_insert(0);
        *total = total.checked_add(op.delta).ok_or_else(|| {
            StockadeError::InvalidInput(format!("delta overflow for item {}", op.item_id))
        })?;
    }

    let aggregated: Vec<TransferOperation> = totals
        .into_iter()
        .filter(|(_, delta)| *delta != 0)
        .map(|(item_id, delta)| TransferOperation { item_id, delta })
        .collect();

    if aggregated.is_empty() {
        return Err(StockadeError::InvalidInput(
            "transfer batch has no net effect".to_string(),
        ));
    }
    Ok(aggregated)
}
