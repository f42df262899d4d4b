//! Shipment planning endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use common::{CustomerId, OrderId};
use domain::Shipment;
use record_store::RecordStore;
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct PlanRequest {
    pub customer_id: CustomerId,
    pub order_id: OrderId,
}

/// POST /shipping/plan - pack an order into parcels and quote rates.
#[tracing::instrument(skip(state, req), fields(order_id = %req.order_id))]
pub async fn plan<S: RecordStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<PlanRequest>,
) -> Result<Json<Shipment>, ApiError> {
    let shipment = state.planner.plan(&req.customer_id, &req.order_id).await?;
    Ok(Json(shipment))
}
