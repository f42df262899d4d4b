//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use saga::{ErrorKind, SagaError};
use shipping::ShippingError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Saga step error.
    Saga(SagaError),
    /// Packing or rate quoting error.
    Shipping(ShippingError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Saga(err) => saga_error_to_response(err),
            ApiError::Shipping(err) => shipping_error_to_response(err),
        };

        if status.is_server_error() {
            tracing::error!(%status, error = %message, "request failed");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    let status = match &err {
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::InvalidPaymentStatus(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::Store(store) if store.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
        DomainError::Store(_) | DomainError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

fn saga_error_to_response(err: SagaError) -> (StatusCode, String) {
    let status = match err.kind() {
        ErrorKind::StockInsufficient | ErrorKind::InvalidState => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::DataIntegrity => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Inconsistency | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

fn shipping_error_to_response(err: ShippingError) -> (StatusCode, String) {
    match err {
        ShippingError::Domain(inner) => domain_error_to_response(inner),
        ShippingError::NoParcelsFound { .. } => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
        ShippingError::RateQuote(_) => (StatusCode::BAD_GATEWAY, err.to_string()),
        ShippingError::InvalidWeightUnit { .. } | ShippingError::InvalidUnit(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        ApiError::Saga(err)
    }
}

impl From<ShippingError> for ApiError {
    fn from(err: ShippingError) -> Self {
        ApiError::Shipping(err)
    }
}
