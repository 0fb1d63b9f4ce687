//! Wires the price refresh use case into the task queue.

use std::sync::Arc;

use serde_json::Value;
use stockade_core::{PriceRefreshRequest, PriceRefreshService};
use stockade_domain::constants::UPDATE_PRODUCT_PRICE_TASK;
use stockade_domain::StockadeError;

use super::queue::InProcessTaskQueue;

/// Register `service` as the `update_product_price` handler.
///
/// Arguments are `{"product_id": .., "new_price": ..}` with `new_price`
/// optional; the task value is the serialized `PriceRefreshOutcome`.
pub fn register_price_refresh(queue: &InProcessTaskQueue, service: Arc<PriceRefreshService>) {
    queue.register(UPDATE_PRODUCT_PRICE_TASK, move |args: Value| {
        let service = Arc::clone(&service);
        async move {
            let request: PriceRefreshRequest = serde_json::from_value(args).map_err(|err| {
                StockadeError::InvalidInput(format!("invalid price refresh arguments: {err}"))
            })?;
            let outcome = service.handle(request).await;
            serde_json::to_value(outcome)
                .map_err(|err| StockadeError::Internal(format!("cannot encode outcome: {err}")))
        }
    });
}
