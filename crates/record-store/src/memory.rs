use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{
    RecordKey, Result, StoreError, StoredRecord, UpdateExpression, UpdateRejected,
    store::RecordStore,
};

type Table = BTreeMap<(String, String), Value>;

/// In-memory record store for tests and single-process runs.
///
/// Behaves like the PostgreSQL implementation, including conditional update
/// semantics. `set_unavailable` makes every call fail with a transient error.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    tables: Arc<RwLock<HashMap<String, Table>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryRecordStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates the backend being unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns the number of records in a table.
    pub async fn record_count(&self, table: &str) -> usize {
        self.tables
            .read()
            .await
            .get(table)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    /// Clears all tables.
    pub async fn clear(&self) {
        self.tables.write().await.clear();
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn storage_key(key: &RecordKey) -> (String, String) {
        (key.partition.clone(), key.sort_or_empty().to_string())
    }

    fn record_key(storage_key: &(String, String)) -> RecordKey {
        let (partition, sort) = storage_key;
        if sort.is_empty() {
            RecordKey::partition(partition.clone())
        } else {
            RecordKey::composite(partition.clone(), sort.clone())
        }
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get(&self, table: &str, key: &RecordKey) -> Result<Option<Value>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .and_then(|t| t.get(&Self::storage_key(key)))
            .cloned())
    }

    async fn put(&self, table: &str, key: &RecordKey, data: Value) -> Result<()> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        tables
            .entry(table.to_string())
            .or_default()
            .insert(Self::storage_key(key), data);
        Ok(())
    }

    async fn update(
        &self,
        table: &str,
        key: &RecordKey,
        update: &UpdateExpression,
    ) -> Result<Value> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let stored = tables
            .get_mut(table)
            .and_then(|t| t.get_mut(&Self::storage_key(key)))
            .ok_or_else(|| StoreError::NotFound {
                table: table.to_string(),
                key: key.clone(),
            })?;

        let mut updated = stored.clone();
        update.apply(&mut updated).map_err(|rejected| match rejected {
            UpdateRejected::ConditionFailed => StoreError::ConditionalCheckFailed {
                table: table.to_string(),
                key: key.clone(),
            },
            UpdateRejected::InvalidPath(path) => StoreError::InvalidPath {
                table: table.to_string(),
                key: key.clone(),
                path,
            },
        })?;

        *stored = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, table: &str, key: &RecordKey) -> Result<()> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if let Some(t) = tables.get_mut(table) {
            t.remove(&Self::storage_key(key));
        }
        Ok(())
    }

    async fn scan(&self, table: &str, partition: &str) -> Result<Vec<StoredRecord>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        let Some(t) = tables.get(table) else {
            return Ok(Vec::new());
        };

        Ok(t.iter()
            .filter(|((p, _), _)| p == partition)
            .map(|(k, data)| StoredRecord {
                key: Self::record_key(k),
                data: data.clone(),
            })
            .collect())
    }

    async fn batch_get(&self, table: &str, keys: &[RecordKey]) -> Result<Vec<StoredRecord>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        let Some(t) = tables.get(table) else {
            return Ok(Vec::new());
        };

        Ok(keys
            .iter()
            .filter_map(|key| {
                t.get(&Self::storage_key(key)).map(|data| StoredRecord {
                    key: key.clone(),
                    data: data.clone(),
                })
            })
            .collect())
    }
}
