//! SQLite-backed implementation of the `StockRepository` port.
//!
//! Quantity changes go through the core OCC coordinator on a write session,
//! so concurrent adjustments never lose updates. Reads are cached
//! read-through when a cache is attached; every mutation evicts the touched
//! item, the default list page and both stock aggregates.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use stockade_core::occ::statements::stock_items;
use stockade_core::{
    cache_get, cache_set, CacheStore, Session, SqlValue, Statement,
    StockRepository as StockRepositoryPort,
};
use stockade_domain::constants::{
    stock_item_key, DEFAULT_CACHE_TTL_SECS, STATS_PRODUCTS_KEY, STATS_WAREHOUSES_KEY,
    STOCK_ITEMS_LIST_KEY,
};
use stockade_domain::{
    NewStockItem, Page, ProductStockTotal, Result, StockFilter, StockItem, StockadeError,
    TransferOperation, Version, WarehouseStockTotal,
};
use tokio::task;
use tracing::{debug, info};

use super::manager::DbManager;
use super::session::SqliteSession;
use crate::errors::map_join_error;

/// SQLite-backed stock item repository.
pub struct SqliteStockRepository {
    db: Arc<DbManager>,
    cache: Option<Arc<dyn CacheStore>>,
    ttl: Duration,
}

impl SqliteStockRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db, cache: None, ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS) }
    }

    /// Attach a read-through cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        self.cache = Some(cache);
        self.ttl = ttl;
        self
    }

    fn cached<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let cache = self.cache.as_deref()?;
        let hit = cache_get(cache, key);
        if hit.is_some() {
            debug!(key, "cache hit");
        }
        hit
    }

    fn store<T: serde::Serialize>(&self, key: &str, value: &T) {
        if let Some(cache) = self.cache.as_deref() {
            cache_set(cache, key, value, self.ttl);
        }
    }

    fn invalidate(&self, item_ids: impl IntoIterator<Item = i64>) {
        let Some(cache) = self.cache.as_deref() else {
            return;
        };
        for id in item_ids {
            cache.delete(&stock_item_key(id));
        }
        cache.delete(STOCK_ITEMS_LIST_KEY);
        cache.delete(STATS_PRODUCTS_KEY);
        cache.delete(STATS_WAREHOUSES_KEY);
    }

    async fn write<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteSession) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> Result<T> {
            let mut session = db.session()?;
            op(&mut session)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn read<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteSession) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> Result<T> {
            let mut session = db.read_session()?;
            let value = op(&mut session)?;
            session.commit()?;
            Ok(value)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl StockRepositoryPort for SqliteStockRepository {
    async fn create(&self, item: NewStockItem) -> Result<StockItem> {
        item.validate()?;
        let created = self.write(move |session| insert_item(session, &item)).await?;
        info!(item_id = created.id, product_id = created.product_id, "stock item created");
        self.invalidate([created.id]);
        Ok(created)
    }

    async fn get(&self, item_id: i64) -> Result<Option<StockItem>> {
        let key = stock_item_key(item_id);
        if let Some(item) = self.cached::<StockItem>(&key) {
            return Ok(Some(item));
        }

        let item = self.read(move |session| fetch_item(session, item_id)).await?;
        if let Some(item) = &item {
            self.store(&key, item);
        }
        Ok(item)
    }

    async fn list(&self, filter: StockFilter) -> Result<Page<StockItem>> {
        filter.validate()?;
        let cacheable = filter == StockFilter::default();
        if cacheable {
            if let Some(page) = self.cached::<Page<StockItem>>(STOCK_ITEMS_LIST_KEY) {
                return Ok(page);
            }
        }

        let page = self.read(move |session| list_items(session, &filter)).await?;
        if cacheable {
            self.store(STOCK_ITEMS_LIST_KEY, &page);
        }
        Ok(page)
    }

    async fn adjust_quantity(
        &self,
        item_id: i64,
        delta: i64,
        expected_version: Option<Version>,
    ) -> Result<StockItem> {
        let result = self
            .write(move |session| {
                stockade_core::adjust_quantity(session, item_id, delta, expected_version)
                    .map_err(StockadeError::from)
            })
            .await;
        // a failed attempt may still follow a concurrent change
        self.invalidate([item_id]);
        let item = result?;
        debug!(item_id, delta, version = %item.version, "stock adjusted");
        Ok(item)
    }

    async fn transfer(&self, ops: Vec<TransferOperation>) -> Result<Vec<StockItem>> {
        let touched: Vec<i64> = ops.iter().map(|op| op.item_id).collect();
        let result = self
            .write(move |session| {
                stockade_core::apply_transfers(session, &ops).map_err(StockadeError::from)
            })
            .await;
        self.invalidate(touched);
        let items = result?;
        info!(items = items.len(), "transfer applied");
        Ok(items)
    }

    async fn delete(&self, item_id: i64) -> Result<bool> {
        let deleted = self.write(move |session| delete_item(session, item_id)).await?;
        if deleted {
            self.invalidate([item_id]);
        }
        Ok(deleted)
    }

    async fn product_stock_totals(&self) -> Result<Vec<ProductStockTotal>> {
        if let Some(totals) = self.cached(STATS_PRODUCTS_KEY) {
            return Ok(totals);
        }
        let totals = self.read(query_product_totals).await?;
        self.store(STATS_PRODUCTS_KEY, &totals);
        Ok(totals)
    }

    async fn warehouse_stock_totals(&self) -> Result<Vec<WarehouseStockTotal>> {
        if let Some(totals) = self.cached(STATS_WAREHOUSES_KEY) {
            return Ok(totals);
        }
        let totals = self.read(query_warehouse_totals).await?;
        self.store(STATS_WAREHOUSES_KEY, &totals);
        Ok(totals)
    }
}

/* -------------------------------------------------------------------------- */
/* Synchronous SQL Operations (called inside spawn_blocking) */
/* -------------------------------------------------------------------------- */

fn insert_item(session: &mut SqliteSession, item: &NewStockItem) -> Result<StockItem> {
    let insert = Statement::new(
        "stock_item.insert",
        "INSERT INTO warehouse_items (product_id, warehouse_id, quantity, version) \
         VALUES (:product_id, :warehouse_id, :quantity, 0)",
    )
    .bind(":product_id", item.product_id)
    .bind(":warehouse_id", item.warehouse_id)
    .bind(":quantity", item.quantity);
    session.execute(&insert)?;

    let id = session.last_insert_rowid();
    let created = fetch_item(session, id)?
        .ok_or_else(|| StockadeError::Internal(format!("stock item {id} vanished after insert")))?;
    session.commit()?;
    Ok(created)
}

fn fetch_item(session: &mut SqliteSession, item_id: i64) -> Result<Option<StockItem>> {
    let row = session.query_row(&stock_items::select(item_id))?;
    Ok(row.as_ref().map(stock_items::decode).transpose()?)
}

fn delete_item(session: &mut SqliteSession, item_id: i64) -> Result<bool> {
    let affected = session.execute(
        &Statement::new("stock_item.delete", "DELETE FROM warehouse_items WHERE id = :id")
            .bind(":id", item_id),
    )?;
    session.commit()?;
    Ok(affected > 0)
}

/// WHERE clause and bindings for a listing filter.
fn filter_clause(filter: &StockFilter) -> (String, Vec<(&'static str, SqlValue)>) {
    let mut conditions = Vec::new();
    let mut params = Vec::new();
    if let Some(warehouse_id) = filter.warehouse_id {
        conditions.push("wi.warehouse_id = :warehouse_id");
        params.push((":warehouse_id", SqlValue::from(warehouse_id)));
    }
    if let Some(product_id) = filter.product_id {
        conditions.push("wi.product_id = :product_id");
        params.push((":product_id", SqlValue::from(product_id)));
    }
    if let Some(min_qty) = filter.min_qty {
        conditions.push("wi.quantity >= :min_qty");
        params.push((":min_qty", SqlValue::from(min_qty)));
    }
    if let Some(max_qty) = filter.max_qty {
        conditions.push("wi.quantity <= :max_qty");
        params.push((":max_qty", SqlValue::from(max_qty)));
    }

    if conditions.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), params)
    }
}

fn list_items(session: &mut SqliteSession, filter: &StockFilter) -> Result<Page<StockItem>> {
    let (clause, params) = filter_clause(filter);

    let mut count = Statement::new(
        "stock_item.count",
        format!("SELECT COUNT(*) AS total FROM warehouse_items wi{clause}"),
    );
    count.params.clone_from(&params);
    let total = session.query_row(&count)?.map(|row| row.get_i64("total")).transpose()?;

    let mut select = Statement::new(
        "stock_item.list",
        format!("{}{clause} ORDER BY wi.id LIMIT :limit OFFSET :offset", stock_items::SELECT),
    );
    select.params = params;
    let select = select.bind(":limit", filter.limit()).bind(":offset", filter.offset());

    let items = session
        .query(&select)?
        .iter()
        .map(stock_items::decode)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Page {
        total: total.and_then(|t| u64::try_from(t).ok()).unwrap_or(0),
        page: filter.page,
        page_size: filter.page_size,
        items,
    })
}

fn query_product_totals(session: &mut SqliteSession) -> Result<Vec<ProductStockTotal>> {
    let rows = session.query(&Statement::new(
        "stats.products",
        "SELECT p.id AS product_id, p.name AS product_name, \
         COALESCE(SUM(wi.quantity), 0) AS total_quantity \
         FROM products p LEFT JOIN warehouse_items wi ON wi.product_id = p.id \
         GROUP BY p.id, p.name ORDER BY p.id",
    ))?;
    rows.iter()
        .map(|row| {
            Ok(ProductStockTotal {
                product_id: row.get_i64("product_id")?,
                product_name: row.get_string("product_name")?,
                total_quantity: row.get_i64("total_quantity")?,
            })
        })
        .collect()
}

fn query_warehouse_totals(session: &mut SqliteSession) -> Result<Vec<WarehouseStockTotal>> {
    let rows = session.query(&Statement::new(
        "stats.warehouses",
        "SELECT w.id AS warehouse_id, w.name AS warehouse_name, \
         COALESCE(SUM(wi.quantity), 0) AS total_quantity \
         FROM warehouses w LEFT JOIN warehouse_items wi ON wi.warehouse_id = w.id \
         GROUP BY w.id, w.name ORDER BY w.id",
    ))?;
    rows.iter()
        .map(|row| {
            Ok(WarehouseStockTotal {
                warehouse_id: row.get_i64("warehouse_id")?,
                warehouse_name: row.get_string("warehouse_name")?,
                total_quantity: row.get_i64("total_quantity")?,
            })
        })
        .collect()
}
