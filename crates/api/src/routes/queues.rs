//! Manual triggers for the queue consumers the workers also run.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use record_store::RecordStore;
use saga::DrainReport;

use crate::AppState;
use crate::error::ApiError;

/// POST /orders/staging/drain
pub async fn drain_staged<S: RecordStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<DrainReport>, ApiError> {
    Ok(Json(state.saga.staging.drain_staged().await?))
}

/// POST /orders/payment-status/process
pub async fn process_payment_statuses<S: RecordStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<DrainReport>, ApiError> {
    Ok(Json(
        state.saga.payment_status.process_payment_statuses().await?,
    ))
}

/// POST /inventory/adjustments/apply
pub async fn apply_adjustments<S: RecordStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<DrainReport>, ApiError> {
    Ok(Json(state.saga.adjustments.apply_pending().await?))
}
