//! SQLite-backed implementation of the `ProductRepository` port.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use stockade_core::occ::statements::products;
use stockade_core::{
    cache_get, cache_set, CacheStore, ProductRepository as ProductRepositoryPort, Session,
    Statement,
};
use stockade_domain::constants::{product_key, DEFAULT_CACHE_TTL_SECS, STATS_PRODUCTS_KEY};
use stockade_domain::{validate_price, NewProduct, Product, Result, StockadeError, Version};
use tokio::task;
use tracing::info;

use super::manager::DbManager;
use super::session::SqliteSession;
use crate::errors::map_join_error;

/// SQLite-backed product repository, cached per product id.
pub struct SqliteProductRepository {
    db: Arc<DbManager>,
    cache: Option<Arc<dyn CacheStore>>,
    ttl: Duration,
}

impl SqliteProductRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db, cache: None, ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS) }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        self.cache = Some(cache);
        self.ttl = ttl;
        self
    }

    fn evict(&self, product_id: i64) {
        if let Some(cache) = self.cache.as_deref() {
            cache.delete(&product_key(product_id));
            cache.delete(STATS_PRODUCTS_KEY);
        }
    }
}

#[async_trait]
impl ProductRepositoryPort for SqliteProductRepository {
    async fn create(&self, product: NewProduct) -> Result<Product> {
        product.validate()?;
        let db = Arc::clone(&self.db);
        let created = task::spawn_blocking(move || -> Result<Product> {
            let mut session = db.session()?;
            insert_product(&mut session, &product)
        })
        .await
        .map_err(map_join_error)??;

        info!(product_id = created.id, "product created");
        self.evict(created.id);
        Ok(created)
    }

    async fn get(&self, product_id: i64) -> Result<Option<Product>> {
        let key = product_key(product_id);
        if let Some(product) = self.cache.as_deref().and_then(|cache| cache_get(cache, &key)) {
            return Ok(Some(product));
        }

        let db = Arc::clone(&self.db);
        let product = task::spawn_blocking(move || -> Result<Option<Product>> {
            let mut session = db.read_session()?;
            let product = fetch_product(&mut session, product_id)?;
            session.commit()?;
            Ok(product)
        })
        .await
        .map_err(map_join_error)??;

        if let (Some(cache), Some(product)) = (self.cache.as_deref(), &product) {
            cache_set(cache, &key, product, self.ttl);
        }
        Ok(product)
    }

    async fn update_price(
        &self,
        product_id: i64,
        price: f64,
        expected_version: Option<Version>,
    ) -> Result<Product> {
        validate_price(price)?;
        let db = Arc::clone(&self.db);
        let result = task::spawn_blocking(move || -> Result<Product> {
            let mut session = db.session()?;
            stockade_core::update_product_price(&mut session, product_id, price, expected_version)
                .map_err(StockadeError::from)
        })
        .await
        .map_err(map_join_error)?;

        self.evict(product_id);
        let product = result?;
        info!(product_id, price, version = %product.version, "product price updated");
        Ok(product)
    }

    async fn total_stock(&self, product_id: i64) -> Result<i64> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> Result<i64> {
            let mut session = db.read_session()?;
            if fetch_product(&mut session, product_id)?.is_none() {
                return Err(StockadeError::not_found("product", product_id));
            }
            let row = session.query_row(
                &Statement::new(
                    "product.total_stock",
                    "SELECT COALESCE(SUM(quantity), 0) AS total FROM warehouse_items \
                     WHERE product_id = :id",
                )
                .bind(":id", product_id),
            )?;
            session.commit()?;
            Ok(row.map(|row| row.get_i64("total")).transpose()?.unwrap_or(0))
        })
        .await
        .map_err(map_join_error)?
    }
}

/* -------------------------------------------------------------------------- */
/* Synchronous SQL Operations (called inside spawn_blocking) */
/* -------------------------------------------------------------------------- */

fn insert_product(session: &mut SqliteSession, product: &NewProduct) -> Result<Product> {
    session.execute(
        &Statement::new(
            "product.insert",
            "INSERT INTO products (name, price, version) VALUES (:name, :price, 0)",
        )
        .bind(":name", product.name.as_str())
        .bind(":price", product.price),
    )?;
    let id = session.last_insert_rowid();
    let created = fetch_product(session, id)?
        .ok_or_else(|| StockadeError::Internal(format!("product {id} vanished after insert")))?;
    session.commit()?;
    Ok(created)
}

fn fetch_product(session: &mut SqliteSession, product_id: i64) -> Result<Option<Product>> {
    let row = session.query_row(&products::select(product_id))?;
    Ok(row.as_ref().map(products::decode).transpose()?)
}
