//! Warehouse persistence.
//!
//! Warehouses carry a version column like the other tables but are only
//! created and read here; stock rows reference them by id.

use std::sync::Arc;

use stockade_core::{Session, Statement};
use stockade_domain::{Result, StockadeError, Version, Warehouse};
use tokio::task;

use super::manager::DbManager;
use crate::errors::map_join_error;

pub struct SqliteWarehouseRepository {
    db: Arc<DbManager>,
}

impl SqliteWarehouseRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    pub async fn create(&self, name: &str) -> Result<Warehouse> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(StockadeError::InvalidInput("warehouse name must not be empty".into()));
        }

        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> Result<Warehouse> {
            let mut session = db.session()?;
            session.execute(
                &Statement::new(
                    "warehouse.insert",
                    "INSERT INTO warehouses (name, version) VALUES (:name, 0)",
                )
                .bind(":name", name.as_str()),
            )?;
            let id = session.last_insert_rowid();
            session.commit()?;
            Ok(Warehouse { id, name, version: Version::INITIAL })
        })
        .await
        .map_err(map_join_error)?
    }

    pub async fn get(&self, warehouse_id: i64) -> Result<Option<Warehouse>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> Result<Option<Warehouse>> {
            let mut session = db.read_session()?;
            let row = session.query_row(
                &Statement::new(
                    "warehouse.select",
                    "SELECT id, name, COALESCE(version, 0) AS version FROM warehouses \
                     WHERE id = :id",
                )
                .bind(":id", warehouse_id),
            )?;
            session.commit()?;
            let Some(row) = row else {
                return Ok(None);
            };
            Ok(Some(Warehouse {
                id: row.get_i64("id")?,
                name: row.get_string("name")?,
                version: Version::from_column(row.get_opt_i64("version")?),
            }))
        })
        .await
        .map_err(map_join_error)?
    }
}
