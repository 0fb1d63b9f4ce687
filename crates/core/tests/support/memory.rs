//! In-memory store for the core's versioned statements.
//!
//! Writes land in the shared tables immediately, atomically under one lock,
//! which is exactly the guarantee a relational store gives a single
//! conditional UPDATE. Each session keeps an undo log so `rollback` restores
//! the rows it touched.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use stockade_core::{Row, Session, SqlValue, Statement, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemRow {
    pub product_id: i64,
    pub warehouse_id: i64,
    pub quantity: i64,
    pub version: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductRow {
    pub name: String,
    pub price: f64,
    pub version: Option<i64>,
}

#[derive(Debug, Default)]
struct Tables {
    items: BTreeMap<i64, ItemRow>,
    products: BTreeMap<i64, ProductRow>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_item(&self, id: i64, quantity: i64, version: Option<i64>) {
        self.tables
            .lock()
            .items
            .insert(id, ItemRow { product_id: 1, warehouse_id: 1, quantity, version });
    }

    pub fn insert_product(&self, id: i64, name: &str, price: f64, version: Option<i64>) {
        self.tables
            .lock()
            .products
            .insert(id, ProductRow { name: name.to_string(), price, version });
    }

    pub fn item(&self, id: i64) -> Option<ItemRow> {
        self.tables.lock().items.get(&id).copied()
    }

    pub fn product(&self, id: i64) -> Option<ProductRow> {
        self.tables.lock().products.get(&id).cloned()
    }

    pub fn session(&self) -> MemorySession {
        MemorySession { store: self.clone(), undo: Vec::new(), commits: 0, rollbacks: 0 }
    }
}

enum Undo {
    Item(i64, ItemRow),
    Product(i64, ProductRow),
}

pub struct MemorySession {
    store: MemoryStore,
    undo: Vec<Undo>,
    pub commits: usize,
    pub rollbacks: usize,
}

fn int_param(statement: &Statement, name: &str) -> Result<i64, StoreError> {
    statement
        .param(name)
        .and_then(SqlValue::as_i64)
        .ok_or_else(|| StoreError::backend(statement.label, format!("missing param {name}")))
}

impl Session for MemorySession {
    fn query(&mut self, statement: &Statement) -> Result<Vec<Row>, StoreError> {
        let id = int_param(statement, ":id")?;
        let tables = self.store.tables.lock();
        let row = match statement.label {
            "stock_item.read_version" => {
                tables.items.get(&id).map(|r| Row::new().with("version", r.version.unwrap_or(0)))
            }
            "stock_item.select" => tables.items.get(&id).map(|r| {
                Row::new()
                    .with("id", id)
                    .with("product_id", r.product_id)
                    .with("warehouse_id", r.warehouse_id)
                    .with("quantity", r.quantity)
                    .with("version", r.version.unwrap_or(0))
                    .with("product", SqlValue::Null)
                    .with("warehouse", SqlValue::Null)
            }),
            "product.read_version" => tables
                .products
                .get(&id)
                .map(|p| Row::new().with("version", p.version.unwrap_or(0))),
            "product.select" => tables.products.get(&id).map(|p| {
                Row::new()
                    .with("id", id)
                    .with("name", p.name.clone())
                    .with("price", p.price)
                    .with("version", p.version.unwrap_or(0))
            }),
            other => return Err(StoreError::backend(other, "unsupported query")),
        };
        Ok(row.into_iter().collect())
    }

    fn execute(&mut self, statement: &Statement) -> Result<usize, StoreError> {
        let id = int_param(statement, ":id")?;
        let expected = int_param(statement, ":expected_version")?;
        let new_version = int_param(statement, ":new_version")?;
        let mut tables = self.store.tables.lock();

        match statement.label {
            "stock_item.apply_delta" => {
                let delta = int_param(statement, ":delta")?;
                let required = statement.param(":required").and_then(SqlValue::as_i64);
                let Some(row) = tables.items.get_mut(&id) else { return Ok(0) };
                if row.version.unwrap_or(0) != expected {
                    return Ok(0);
                }
                if required.is_some_and(|r| row.quantity < r) {
                    return Ok(0);
                }
                self.undo.push(Undo::Item(id, *row));
                row.quantity += delta;
                row.version = Some(new_version);
                Ok(1)
            }
            "product.update_price" => {
                let price = statement
                    .param(":price")
                    .and_then(SqlValue::as_f64)
                    .ok_or_else(|| StoreError::backend(statement.label, "missing price"))?;
                let Some(row) = tables.products.get_mut(&id) else { return Ok(0) };
                if row.version.unwrap_or(0) != expected {
                    return Ok(0);
                }
                self.undo.push(Undo::Product(id, row.clone()));
                row.price = price;
                row.version = Some(new_version);
                Ok(1)
            }
            other => Err(StoreError::backend(other, "unsupported statement")),
        }
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.undo.clear();
        self.commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        let mut tables = self.store.tables.lock();
        for entry in self.undo.drain(..).rev() {
            match entry {
                Undo::Item(id, row) => {
                    tables.items.insert(id, row);
                }
                Undo::Product(id, row) => {
                    tables.products.insert(id, row);
                }
            }
        }
        self.rollbacks += 1;
        Ok(())
    }
}
