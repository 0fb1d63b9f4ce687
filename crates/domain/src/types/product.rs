//! Products and vendor prices

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::inventory::Version;
use crate::errors::{Result, StockadeError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub version: Version,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub price: f64,
}

impl NewProduct {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(StockadeError::InvalidInput("product name is required".to_string()));
        }
        validate_price(self.price)
    }
}

pub fn validate_price(price: f64) -> Result<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(StockadeError::InvalidInput(format!(
            "price must be a non-negative number, got {price}"
        )));
    }
    Ok(())
}

/// Price reported by the upstream vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub product_id: i64,
    pub price: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub vendor: String,
    #[serde(default = "Utc::now")]
    pub fetched_at: DateTime<Utc>,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Result of one background price refresh, as reported to the task queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PriceRefreshOutcome {
    Updated { product_id: i64, price: f64, version: Version },
    NotFound { product_id: i64 },
    Failed { product_id: i64, error: String },
}

impl PriceRefreshOutcome {
    pub fn product_id(&self) -> i64 {
        match self {
            Self::Updated { product_id, .. }
            | Self::NotFound { product_id }
            | Self::Failed { product_id, .. } => *product_id,
        }
    }
}
