//! Price refresh use case

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stockade_domain::{validate_price, PriceRefreshOutcome, StockadeError};
use tracing::{info, instrument, warn};

use crate::ports::{PriceSource, ProductRepository};

/// Arguments of the `update_product_price` task.
///
/// Without `new_price` the price is fetched from the vendor first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRefreshRequest {
    pub product_id: i64,
    #[serde(default)]
    pub new_price: Option<f64>,
}

/// Writes vendor (or caller-supplied) prices onto products with an OCC
/// update.
pub struct PriceRefreshService {
    source: Arc<dyn PriceSource>,
    products: Arc<dyn ProductRepository>,
}

impl PriceRefreshService {
    pub fn new(source: Arc<dyn PriceSource>, products: Arc<dyn ProductRepository>) -> Self {
        Self { source, products }
    }

    /// Run one refresh request. Never fails; errors become
    /// [`PriceRefreshOutcome::Failed`].
    pub async fn handle(&self, request: PriceRefreshRequest) -> PriceRefreshOutcome {
        match request.new_price {
            Some(price) => self.apply_price(request.product_id, price).await,
            None => self.refresh(request.product_id).await,
        }
    }

    /// Fetch the current vendor price and store it.
    #[instrument(skip(self))]
    pub async fn refresh(&self, product_id: i64) -> PriceRefreshOutcome {
        match self.source.fetch_price(product_id).await {
            Ok(quote) => self.apply_price(product_id, quote.price).await,
            Err(err) => {
                warn!(product_id, error = %err, "Vendor price lookup failed");
                PriceRefreshOutcome::Failed { product_id, error: err.to_string() }
            }
        }
    }

    /// Store `price` on the product at whatever version it currently has.
    #[instrument(skip(self))]
    pub async fn apply_price(&self, product_id: i64, price: f64) -> PriceRefreshOutcome {
        if let Err(err) = validate_price(price) {
            return PriceRefreshOutcome::Failed { product_id, error: err.to_string() };
        }

        match self.products.update_price(product_id, price, None).await {
            Ok(product) => {
                info!(product_id, price, version = product.version.get(), "Product price updated");
                PriceRefreshOutcome::Updated {
                    product_id,
                    price: product.price,
                    version: product.version,
                }
            }
            Err(StockadeError::NotFound(_)) => PriceRefreshOutcome::NotFound { product_id },
            Err(err) => {
                warn!(product_id, error = %err, "Product price update failed");
                PriceRefreshOutcome::Failed { product_id, error: err.to_string() }
            }
        }
    }
}
