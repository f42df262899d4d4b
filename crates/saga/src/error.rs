//! Saga error types.

use common::{ItemId, OrderId};
use domain::{DomainError, OrderStatus};
use queue::QueueError;
use record_store::StoreError;
use thiserror::Error;

/// Broad classes of saga failures, used to decide on retries and on the
/// response shown to a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Expected business outcome, reported to the user and never retried.
    StockInsufficient,
    NotFound,
    /// The request does not apply to the record in its current state.
    InvalidState,
    /// Bad data on a queue; needs investigation.
    DataIntegrity,
    /// Retrying later may succeed.
    Transient,
    /// A compensation could not be delivered. Stock is out of sync until an
    /// operator intervenes.
    Inconsistency,
    Internal,
}

/// Errors that can occur during saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    /// A conditional stock decrement was rejected.
    #[error("Insufficient stock for item {item_id}")]
    StockInsufficient { item_id: ItemId },

    /// A payment status message carried a status outside the provider's set.
    #[error("Invalid payment status '{value}' in message {message_id}")]
    InvalidPaymentStatus { message_id: String, value: String },

    /// A payment status arrived for an order that has not been staged yet.
    #[error("Order not staged: {order_id}")]
    OrderNotStaged { order_id: OrderId },

    /// The order is not in a state that accepts the operation.
    #[error("Order {order_id} is {status}")]
    InvalidOrderState {
        order_id: OrderId,
        status: OrderStatus,
    },

    /// Queue error.
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Messages were applied but could not be deleted from the queue. They
    /// will be redelivered and re-applied.
    #[error("Failed to acknowledge messages on {queue}: {source}")]
    AckFailed { queue: String, source: QueueError },

    /// An inventory adjustment could not be sent after retries.
    #[error("Compensation for order {order_id} failed: {source}")]
    CompensationFailed { order_id: OrderId, source: QueueError },

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Store error outside a domain operation.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A stock check task panicked or was cancelled.
    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SagaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SagaError::StockInsufficient { .. } => ErrorKind::StockInsufficient,
            SagaError::InvalidPaymentStatus { .. } => ErrorKind::DataIntegrity,
            SagaError::OrderNotStaged { .. } => ErrorKind::Transient,
            SagaError::InvalidOrderState { .. } => ErrorKind::InvalidState,
            SagaError::Queue(err) if err.is_transient() => ErrorKind::Transient,
            SagaError::Queue(_) => ErrorKind::Internal,
            SagaError::AckFailed { .. } => ErrorKind::Transient,
            SagaError::CompensationFailed { .. } => ErrorKind::Inconsistency,
            SagaError::Domain(DomainError::NotFound { .. }) => ErrorKind::NotFound,
            SagaError::Domain(DomainError::InvalidPaymentStatus(_)) => ErrorKind::DataIntegrity,
            SagaError::Domain(err) if err.is_transient() => ErrorKind::Transient,
            SagaError::Store(StoreError::NotFound { .. }) => ErrorKind::NotFound,
            SagaError::Store(err) if err.is_transient() => ErrorKind::Transient,
            SagaError::Store(_) => ErrorKind::Internal,
            SagaError::Domain(_) | SagaError::Task(_) | SagaError::Serialization(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
