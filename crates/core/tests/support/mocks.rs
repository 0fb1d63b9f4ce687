//! Mock port implementations for testing

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use stockade_core::{PriceSource, ProductRepository};
use stockade_domain::{
    NewProduct, PriceQuote, Product, Result as DomainResult, StockadeError, Version,
};

/// Price source returning a fixed price, or a fixed error.
pub struct StaticPriceSource {
    result: std::result::Result<f64, StockadeError>,
    pub calls: AtomicU32,
}

impl StaticPriceSource {
    pub fn price(price: f64) -> Self {
        Self { result: Ok(price), calls: AtomicU32::new(0) }
    }

    pub fn failing(err: StockadeError) -> Self {
        Self { result: Err(err), calls: AtomicU32::new(0) }
    }
}

#[async_trait]
impl PriceSource for StaticPriceSource {
    async fn fetch_price(&self, product_id: i64) -> DomainResult<PriceQuote> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let price = self.result.clone()?;
        Ok(PriceQuote {
            product_id,
            price,
            currency: "USD".to_string(),
            vendor: "MockVendor".to_string(),
            fetched_at: chrono::Utc::now(),
        })
    }
}

/// In-memory product repository with OCC-style version bumps.
#[derive(Default)]
pub struct InMemoryProducts {
    products: Mutex<HashMap<i64, Product>>,
    /// When set, every update fails with this error
    pub fail_with: Mutex<Option<StockadeError>>,
}

impl InMemoryProducts {
    pub fn with_product(self, id: i64, name: &str, price: f64) -> Self {
        self.products
            .lock()
            .insert(id, Product { id, name: name.to_string(), price, version: Version(0) });
        self
    }

    pub fn snapshot(&self, id: i64) -> Option<Product> {
        self.products.lock().get(&id).cloned()
    }
}

#[async_trait]
impl ProductRepository for InMemoryProducts {
    async fn create(&self, product: NewProduct) -> DomainResult<Product> {
        let mut products = self.products.lock();
        let id = i64::try_from(products.len()).unwrap_or(i64::MAX) + 1;
        let created = Product { id, name: product.name, price: product.price, version: Version(0) };
        products.insert(id, created.clone());
        Ok(created)
    }

    async fn get(&self, product_id: i64) -> DomainResult<Option<Product>> {
        Ok(self.snapshot(product_id))
    }

    async fn update_price(
        &self,
        product_id: i64,
        price: f64,
        expected_version: Option<Version>,
    ) -> DomainResult<Product> {
        if let Some(err) = self.fail_with.lock().clone() {
            return Err(err);
        }
        let mut products = self.products.lock();
        let product = products
            .get_mut(&product_id)
            .ok_or_else(|| StockadeError::not_found("product", product_id))?;
        if expected_version.is_some_and(|v| v != product.version) {
            return Err(StockadeError::version_conflict(format!("product {product_id}")));
        }
        product.price = price;
        product.version = product.version.next();
        Ok(product.clone())
    }

    async fn total_stock(&self, _product_id: i64) -> DomainResult<i64> {
        Ok(0)
    }
}
