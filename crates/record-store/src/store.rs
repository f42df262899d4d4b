use async_trait::async_trait;
use serde_json::Value;

use crate::{RecordKey, Result, UpdateExpression};

/// A record returned by scans and batch reads.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub key: RecordKey,
    pub data: Value,
}

/// Core trait for record store implementations.
///
/// All implementations must be thread-safe (Send + Sync). Table names are
/// plain strings supplied by the caller's configuration.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Reads a single record. Returns None if it does not exist.
    async fn get(&self, table: &str, key: &RecordKey) -> Result<Option<Value>>;

    /// Writes a record, replacing any existing one (idempotent upsert).
    async fn put(&self, table: &str, key: &RecordKey, data: Value) -> Result<()>;

    /// Applies an update expression to an existing record and returns the
    /// updated document.
    ///
    /// Fails with `NotFound` if the record does not exist and with
    /// `ConditionalCheckFailed` if the expression's condition does not hold.
    /// A rejected update leaves the stored record untouched.
    async fn update(
        &self,
        table: &str,
        key: &RecordKey,
        update: &UpdateExpression,
    ) -> Result<Value>;

    /// Deletes a record. Deleting a missing record is not an error.
    async fn delete(&self, table: &str, key: &RecordKey) -> Result<()>;

    /// Returns every record in a partition, ordered by sort key.
    async fn scan(&self, table: &str, partition: &str) -> Result<Vec<StoredRecord>>;

    /// Reads several records at once. Missing keys are omitted.
    async fn batch_get(&self, table: &str, keys: &[RecordKey]) -> Result<Vec<StoredRecord>>;
}
