//! Statement builders for the versioned tables
//!
//! Every conditional update compares `COALESCE(version, 0)` so rows that were
//! never written through OCC (NULL version) behave as version 0.

use stockade_domain::{Product, StockItem, Version};

use crate::store::{Row, Statement, StoreError};

pub mod stock_items {
    use super::{Row, Statement, StockItem, StoreError, Version};

    pub fn read_version(item_id: i64) -> Statement {
        Statement::new(
            "stock_item.read_version",
            "SELECT COALESCE(version, 0) AS version FROM warehouse_items WHERE id = :id",
        )
        .bind(":id", item_id)
    }

    /// Conditional `quantity += delta`.
    ///
    /// With `required` set the row must also hold at least that quantity, so
    /// the store itself refuses an underflowing decrement.
    pub fn apply_delta(
        item_id: i64,
        delta: i64,
        required: Option<i64>,
        expected: Version,
    ) -> Statement {
        let sql = if required.is_some() {
            "UPDATE warehouse_items \
             SET quantity = quantity + :delta, version = :new_version \
             WHERE id = :id AND COALESCE(version, 0) = :expected_version \
             AND quantity >= :required"
        } else {
            "UPDATE warehouse_items \
             SET quantity = quantity + :delta, version = :new_version \
             WHERE id = :id AND COALESCE(version, 0) = :expected_version"
        };
        let statement = Statement::new("stock_item.apply_delta", sql)
            .bind(":id", item_id)
            .bind(":delta", delta)
            .bind(":expected_version", expected.get())
            .bind(":new_version", expected.next().get());
        match required {
            Some(required) => statement.bind(":required", required),
            None => statement,
        }
    }

    /// Row projection read by [`decode`], without a `WHERE` clause.
    pub const SELECT: &str = "SELECT wi.id, wi.product_id, wi.warehouse_id, wi.quantity, \
         COALESCE(wi.version, 0) AS version, p.name AS product, w.name AS warehouse \
         FROM warehouse_items wi \
         LEFT JOIN products p ON p.id = wi.product_id \
         LEFT JOIN warehouses w ON w.id = wi.warehouse_id";

    pub fn select(item_id: i64) -> Statement {
        Statement::new("stock_item.select", format!("{SELECT} WHERE wi.id = :id"))
            .bind(":id", item_id)
    }

    pub fn decode(row: &Row) -> Result<StockItem, StoreError> {
        Ok(StockItem {
            id: row.get_i64("id")?,
            product_id: row.get_i64("product_id")?,
            warehouse_id: row.get_i64("warehouse_id")?,
            quantity: row.get_i64("quantity")?,
            version: Version::from_column(row.get_opt_i64("version")?),
            product: row.get_opt_string("product")?,
            warehouse: row.get_opt_string("warehouse")?,
        })
    }
}

pub mod products {
    use super::{Product, Row, Statement, StoreError, Version};

    pub fn read_version(product_id: i64) -> Statement {
        Statement::new(
            "product.read_version",
            "SELECT COALESCE(version, 0) AS version FROM products WHERE id = :id",
        )
        .bind(":id", product_id)
    }

    pub fn update_price(product_id: i64, price: f64, expected: Version) -> Statement {
        Statement::new(
            "product.update_price",
            "UPDATE products SET price = :price, version = :new_version \
             WHERE id = :id AND COALESCE(version, 0) = :expected_version",
        )
        .bind(":id", product_id)
        .bind(":price", price)
        .bind(":expected_version", expected.get())
        .bind(":new_version", expected.next().get())
    }

    pub fn select(product_id: i64) -> Statement {
        Statement::new(
            "product.select",
            "SELECT id, name, price, COALESCE(version, 0) AS version FROM products WHERE id = :id",
        )
        .bind(":id", product_id)
    }

    pub fn decode(row: &Row) -> Result<Product, StoreError> {
        Ok(Product {
            id: row.get_i64("id")?,
            name: row.get_string("name")?,
            price: row.get_f64("price")?,
            version: Version::from_column(row.get_opt_i64("version")?),
        })
    }
}
