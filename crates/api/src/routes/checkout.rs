//! Checkout and payment-status intake endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use common::CustomerId;
use domain::{CartLineItem, Order, PaymentStatusMessage};
use record_store::RecordStore;
use saga::{CheckoutOutcome, PaymentRequest};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct OpenOrderRequest {
    pub customer_id: CustomerId,
    pub items: Vec<CartLineItem>,
}

#[derive(Serialize)]
pub struct AcceptedResponse {
    pub message_id: String,
}

/// POST /checkout/orders - open an order for a cart.
#[tracing::instrument(skip(state, req), fields(customer_id = %req.customer_id))]
pub async fn open_order<S: RecordStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<OpenOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    if req.items.is_empty() {
        return Err(ApiError::BadRequest("cart is empty".to_string()));
    }

    let order = state
        .saga
        .checkout
        .open_order(&req.customer_id, req.items, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// POST /checkout/payment - reserve stock and stage the order.
///
/// Out of stock answers 409 and an expired order 410, both with the outcome
/// as body.
#[tracing::instrument(skip(state, req), fields(order_id = %req.order_id))]
pub async fn submit_payment<S: RecordStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<PaymentRequest>,
) -> Result<(StatusCode, Json<CheckoutOutcome>), ApiError> {
    let outcome = state.saga.checkout.submit_payment(req, Utc::now()).await?;
    let status = match &outcome {
        CheckoutOutcome::Staged(_) => StatusCode::OK,
        CheckoutOutcome::OutOfStock { .. } => StatusCode::CONFLICT,
        CheckoutOutcome::Expired { .. } => StatusCode::GONE,
    };
    Ok((status, Json(outcome)))
}

/// POST /payments/status - provider webhook; queues the status update.
#[tracing::instrument(skip(state, message), fields(order_id = %message.order_id))]
pub async fn report_payment_status<S: RecordStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(message): Json<PaymentStatusMessage>,
) -> Result<(StatusCode, Json<AcceptedResponse>), ApiError> {
    let message_id = state.saga.checkout.report_payment_status(&message).await?;
    Ok((StatusCode::ACCEPTED, Json(AcceptedResponse { message_id })))
}
