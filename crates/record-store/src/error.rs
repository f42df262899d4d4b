use thiserror::Error;

use crate::RecordKey;

/// Errors that can occur when interacting with the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The record addressed by an update does not exist.
    #[error("Record not found in {table}: {key}")]
    NotFound { table: String, key: RecordKey },

    /// The update's condition did not hold against the current record.
    #[error("Conditional check failed in {table} for {key}")]
    ConditionalCheckFailed { table: String, key: RecordKey },

    /// The update referenced a field that cannot hold the requested value.
    #[error("Invalid field path '{path}' in {table} for {key}")]
    InvalidPath {
        table: String,
        key: RecordKey,
        path: String,
    },

    /// The backend could not be reached. Safe to retry.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true for faults that may succeed when retried.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Unavailable(_) => true,
            StoreError::Database(err) => matches!(
                err,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            ),
            StoreError::NotFound { .. }
            | StoreError::ConditionalCheckFailed { .. }
            | StoreError::InvalidPath { .. }
            | StoreError::Migration(_)
            | StoreError::Serialization(_) => false,
        }
    }
}

/// Result type for record store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_is_transient() {
        assert!(StoreError::Unavailable("down".to_string()).is_transient());
        assert!(StoreError::Database(sqlx::Error::PoolTimedOut).is_transient());
    }

    #[test]
    fn conditional_check_is_not_transient() {
        let err = StoreError::ConditionalCheckFailed {
            table: "store_items".to_string(),
            key: RecordKey::composite("tops", "0001"),
        };
        assert!(!err.is_transient());
        assert_eq!(
            err.to_string(),
            "Conditional check failed in store_items for tops/0001"
        );
    }
}
