//! Order lookup.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{CustomerId, OrderId};
use domain::Order;
use record_store::RecordStore;

use crate::AppState;
use crate::error::ApiError;

/// GET /customers/{customer_id}/orders/{order_id}
pub async fn get<S: RecordStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((customer_id, order_id)): Path<(String, String)>,
) -> Result<Json<Order>, ApiError> {
    let order = state
        .repository
        .require_order(&CustomerId::new(customer_id), &OrderId::new(order_id))
        .await?;
    Ok(Json(order))
}
