#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use stockade_core::{ProductRepository, StockRepository};
use stockade_domain::{NewProduct, NewStockItem, Product, StockItem, Warehouse};
use stockade_infra::{DbManager, SqliteProductRepository, SqliteStockRepository, SqliteWarehouseRepository};
use tempfile::TempDir;

/// Temporary database that keeps its directory alive for the test.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    pub fn new() -> Self {
        Self::with_pool_size(4)
    }

    pub fn with_pool_size(pool_size: u32) -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("stockade-test.db");

        let manager = DbManager::open(&db_path, pool_size, Duration::from_secs(5))
            .expect("db manager should be created");
        manager.run_migrations().expect("schema should apply");

        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }

    pub fn stock(&self) -> SqliteStockRepository {
        SqliteStockRepository::new(Arc::clone(&self.manager))
    }

    pub fn products(&self) -> SqliteProductRepository {
        SqliteProductRepository::new(Arc::clone(&self.manager))
    }

    pub fn warehouses(&self) -> SqliteWarehouseRepository {
        SqliteWarehouseRepository::new(Arc::clone(&self.manager))
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// A product stocked in two warehouses.
pub struct Seeded {
    pub product: Product,
    pub north: Warehouse,
    pub south: Warehouse,
    pub north_item: StockItem,
    pub south_item: StockItem,
}

pub async fn seed(db: &TestDatabase, north_qty: i64, south_qty: i64) -> Seeded {
    let product = db
        .products()
        .create(NewProduct { name: "Widget".into(), price: 10.0 })
        .await
        .expect("product should be created");
    let north = db.warehouses().create("North").await.expect("warehouse should be created");
    let south = db.warehouses().create("South").await.expect("warehouse should be created");

    let stock = db.stock();
    let north_item = stock
        .create(NewStockItem { product_id: product.id, warehouse_id: north.id, quantity: north_qty })
        .await
        .expect("stock item should be created");
    let south_item = stock
        .create(NewStockItem { product_id: product.id, warehouse_id: south.id, quantity: south_qty })
        .await
        .expect("stock item should be created");

    Seeded { product, north, south, north_item, south_item }
}
