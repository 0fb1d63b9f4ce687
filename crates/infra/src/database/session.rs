//! SQLite implementation of the core [`Session`] port.

use rusqlite::types::{Value, ValueRef};
use rusqlite::ToSql;
use stockade_core::{Row, Session, SqlValue, Statement, StoreError};
use tracing::{trace, warn};

use super::manager::SqliteConnection;
use crate::errors::store_error;

/// One transaction on a pooled connection.
///
/// The transaction opens lazily on the first statement. Dropping the session
/// with the transaction still open rolls it back.
pub struct SqliteSession {
    conn: SqliteConnection,
    begin: &'static str,
    open: bool,
}

impl SqliteSession {
    /// Session whose transaction takes the write lock up front.
    pub fn immediate(conn: SqliteConnection) -> Self {
        Self { conn, begin: "BEGIN IMMEDIATE", open: false }
    }

    /// Session whose transaction only takes locks as statements need them.
    pub fn deferred(conn: SqliteConnection) -> Self {
        Self { conn, begin: "BEGIN DEFERRED", open: false }
    }

    /// Row id of the most recent successful INSERT on this connection.
    pub fn last_insert_rowid(&self) -> i64 {
        self.conn.last_insert_rowid()
    }

    pub fn in_transaction(&self) -> bool {
        self.open
    }

    /// End the open transaction. On failure `open` follows the connection,
    /// so a transaction SQLite still holds is not mistaken for a closed one.
    fn finish(&mut self, sql: &'static str, label: &'static str) -> Result<(), StoreError> {
        if !self.open {
            return Ok(());
        }
        if let Err(err) = self.conn.execute_batch(sql) {
            self.open = !self.conn.is_autocommit();
            return Err(store_error(label, err));
        }
        self.open = false;
        Ok(())
    }

    fn ensure_open(&mut self) -> Result<(), StoreError> {
        if !self.open {
            self.conn.execute_batch(self.begin).map_err(|err| store_error("begin", err))?;
            self.open = true;
        }
        Ok(())
    }
}

impl Session for SqliteSession {
    fn query(&mut self, statement: &Statement) -> Result<Vec<Row>, StoreError> {
        self.ensure_open()?;
        trace!(label = statement.label, "query");
        run_query(&self.conn, statement).map_err(|err| store_error(statement.label, err))
    }

    fn execute(&mut self, statement: &Statement) -> Result<usize, StoreError> {
        self.ensure_open()?;
        trace!(label = statement.label, "execute");
        run_execute(&self.conn, statement).map_err(|err| store_error(statement.label, err))
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.finish("COMMIT", "commit")
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        self.finish("ROLLBACK", "rollback")
    }
}

impl Drop for SqliteSession {
    fn drop(&mut self) {
        if self.open {
            if let Err(err) = self.conn.execute_batch("ROLLBACK") {
                warn!(error = %err, "Rollback of abandoned session failed");
            }
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Synchronous SQL Operations */
/* -------------------------------------------------------------------------- */

fn to_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(v) => Value::Integer(*v),
        SqlValue::Real(v) => Value::Real(*v),
        SqlValue::Text(v) => Value::Text(v.clone()),
    }
}

fn from_value_ref(value: ValueRef<'_>) -> rusqlite::Result<SqlValue> {
    Ok(match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(v) => SqlValue::Integer(v),
        ValueRef::Real(v) => SqlValue::Real(v),
        ValueRef::Text(bytes) => SqlValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(_) => {
            return Err(rusqlite::Error::InvalidColumnType(
                0,
                "blob".into(),
                rusqlite::types::Type::Blob,
            ))
        }
    })
}

fn bound_values(statement: &Statement) -> Vec<(&'static str, Value)> {
    statement.params.iter().map(|(name, value)| (*name, to_value(value))).collect()
}

fn run_query(conn: &rusqlite::Connection, statement: &Statement) -> rusqlite::Result<Vec<Row>> {
    let values = bound_values(statement);
    let params: Vec<(&str, &dyn ToSql)> =
        values.iter().map(|(name, value)| (*name, value as &dyn ToSql)).collect();

    let mut stmt = conn.prepare_cached(&statement.sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut rows = stmt.query(params.as_slice())?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut decoded = Row::new();
        for (idx, column) in columns.iter().enumerate() {
            decoded.push(column.as_str(), from_value_ref(row.get_ref(idx)?)?);
        }
        out.push(decoded);
    }
    Ok(out)
}

fn run_execute(conn: &rusqlite::Connection, statement: &Statement) -> rusqlite::Result<usize> {
    let values = bound_values(statement);
    let params: Vec<(&str, &dyn ToSql)> =
        values.iter().map(|(name, value)| (*name, value as &dyn ToSql)).collect();

    let mut stmt = conn.prepare_cached(&statement.sql)?;
    stmt.execute(params.as_slice())
}
