//! Domain error types.

use record_store::StoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the record store.
    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    /// A record that must exist was not found.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// A payment status outside the provider's fixed set.
    #[error("Invalid payment status: {0}")]
    InvalidPaymentStatus(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Returns true if the underlying store rejected a conditional write.
    pub fn is_conditional_check_failed(&self) -> bool {
        matches!(
            self,
            DomainError::Store(StoreError::ConditionalCheckFailed { .. })
        )
    }

    pub fn is_transient(&self) -> bool {
        match self {
            DomainError::Store(err) => err.is_transient(),
            DomainError::NotFound { .. }
            | DomainError::InvalidPaymentStatus(_)
            | DomainError::Serialization(_) => false,
        }
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
