//! Atomic multi-row quantity transfers
//!
//! A batch is aggregated per item, then each net change is applied with a
//! conditional update inside the caller's session. Nothing is committed
//! until every row has been written; the first failure rolls the whole
//! batch back.

use stockade_domain::{
    aggregate_transfers, ConflictReason, Product, StockItem, StockadeError, TransferOperation,
    Version,
};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::executor::{occ_execute, OccError, OccOptions};
use super::statements::{products, stock_items};
use crate::store::{Session, StoreError};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransferError {
    #[error("invalid transfer: {0}")]
    InvalidInput(String),

    #[error("stock item {item_id} not found")]
    NotFound { item_id: i64 },

    #[error("stock item {item_id} holds {available}, cannot remove {required}")]
    Underflow { item_id: i64, available: i64, required: i64 },

    #[error("stock item {item_id} changed concurrently (expected version {expected})")]
    Conflict { item_id: i64, expected: Version },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TransferError {
    /// Conflict reason the boundary reports, `None` for non-conflicts.
    pub fn conflict_reason(&self) -> Option<ConflictReason> {
        match self {
            Self::Underflow { .. } => Some(ConflictReason::Underflow),
            Self::Conflict { .. } => Some(ConflictReason::VersionMismatch),
            _ => None,
        }
    }
}

impl From<TransferError> for StockadeError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::InvalidInput(message) => StockadeError::InvalidInput(message),
            TransferError::NotFound { item_id } => StockadeError::not_found("stock item", item_id),
            TransferError::Underflow { .. } => StockadeError::underflow(err.to_string()),
            TransferError::Conflict { .. } => StockadeError::version_conflict(err.to_string()),
            TransferError::Store(store) => store.into(),
        }
    }
}

/// Apply a batch of quantity changes as one unit.
///
/// Returns the refreshed state of every touched item, ordered by item id.
///
/// # Errors
/// - `InvalidInput` for an empty batch, a bad item id, or no net change
/// - `NotFound`, `Underflow`, `Conflict` for the first operation that
///   failed; the transaction is rolled back and no row is changed
/// - `Store` for session failures
#[instrument(skip(session, ops), fields(ops = ops.len()))]
pub fn apply_transfers<S>(
    session: &mut S,
    ops: &[TransferOperation],
) -> Result<Vec<StockItem>, TransferError>
where
    S: Session + ?Sized,
{
    let plan = aggregate_transfers(ops).map_err(|err| match err {
        StockadeError::InvalidInput(message) => TransferError::InvalidInput(message),
        other => TransferError::InvalidInput(other.to_string()),
    })?;

    for op in &plan {
        if let Err(err) = apply_one(session, *op, None) {
            return Err(abort(session, err));
        }
    }

    let refreshed: Result<Vec<StockItem>, TransferError> =
        plan.iter().map(|op| fetch_item(session, op.item_id)).collect();
    match refreshed {
        Ok(items) => {
            session.commit()?;
            debug!(items = items.len(), "Transfer batch committed");
            Ok(items)
        }
        Err(err) => Err(abort(session, err)),
    }
}

/// Apply one quantity change, optionally pinned to a client version token.
///
/// A zero delta still bumps the version.
///
/// # Errors
/// Same classification as [`apply_transfers`], minus batch validation.
#[instrument(skip(session))]
pub fn adjust_quantity<S>(
    session: &mut S,
    item_id: i64,
    delta: i64,
    expected_version: Option<Version>,
) -> Result<StockItem, TransferError>
where
    S: Session + ?Sized,
{
    if item_id <= 0 {
        return Err(TransferError::InvalidInput(format!("invalid item_id {item_id}")));
    }
    let op = TransferOperation::new(item_id, delta);
    let result = apply_one(session, op, expected_version)
        .and_then(|()| fetch_item(session, item_id));
    match result {
        Ok(item) => {
            session.commit()?;
            Ok(item)
        }
        Err(err) => Err(abort(session, err)),
    }
}

/// Set a product's price through a conditional update and return the
/// refreshed product.
///
/// # Errors
/// `OccError::NotFound`, `OccError::Conflict` or `OccError::Store`.
#[instrument(skip(session))]
pub fn update_product_price<S>(
    session: &mut S,
    product_id: i64,
    price: f64,
    expected_version: Option<Version>,
) -> Result<Product, OccError>
where
    S: Session + ?Sized,
{
    let key = format!("product {product_id}");
    let result = occ_execute(
        session,
        &key,
        &products::read_version(product_id),
        |expected| products::update_price(product_id, price, expected),
        OccOptions::in_transaction().expect_version(expected_version),
    )
    .and_then(|_| {
        let row = session.query_row(&products::select(product_id))?;
        let row = row.ok_or_else(|| OccError::NotFound { key: key.clone() })?;
        Ok(products::decode(&row)?)
    });

    match result {
        Ok(product) => {
            session.commit()?;
            Ok(product)
        }
        Err(err) => {
            rollback_quietly(session);
            Err(err)
        }
    }
}

fn apply_one<S>(
    session: &mut S,
    op: TransferOperation,
    expected_version: Option<Version>,
) -> Result<(), TransferError>
where
    S: Session + ?Sized,
{
    let required = op.required_quantity();
    let outcome = occ_execute(
        session,
        &format!("stock item {}", op.item_id),
        &stock_items::read_version(op.item_id),
        |expected| stock_items::apply_delta(op.item_id, op.delta, required, expected),
        OccOptions::in_transaction().expect_version(expected_version),
    );

    match outcome {
        Ok(_) => Ok(()),
        Err(OccError::NotFound { .. }) => Err(TransferError::NotFound { item_id: op.item_id }),
        Err(OccError::Store(err)) => Err(err.into()),
        Err(OccError::Conflict { expected, .. }) => {
            Err(classify_rejection(session, op.item_id, required, expected))
        }
    }
}

/// Tell an underflow from a version race by re-reading the row inside the
/// still-open transaction.
fn classify_rejection<S>(
    session: &mut S,
    item_id: i64,
    required: Option<i64>,
    expected: Version,
) -> TransferError
where
    S: Session + ?Sized,
{
    let current = match fetch_item(session, item_id) {
        Ok(item) => item,
        Err(err) => return err,
    };
    match required {
        Some(required) if current.quantity < required && current.version == expected => {
            TransferError::Underflow { item_id, available: current.quantity, required }
        }
        _ => TransferError::Conflict { item_id, expected },
    }
}

fn fetch_item<S>(session: &mut S, item_id: i64) -> Result<StockItem, TransferError>
where
    S: Session + ?Sized,
{
    let row = session.query_row(&stock_items::select(item_id))?;
    let row = row.ok_or(TransferError::NotFound { item_id })?;
    Ok(stock_items::decode(&row)?)
}

fn abort<S>(session: &mut S, err: TransferError) -> TransferError
where
    S: Session + ?Sized,
{
    debug!(error = %err, "Rolling back stock change");
    rollback_quietly(session);
    err
}

fn rollback_quietly<S>(session: &mut S)
where
    S: Session + ?Sized,
{
    if let Err(rollback_err) = session.rollback() {
        warn!(error = %rollback_err, "Rollback failed");
    }
}
