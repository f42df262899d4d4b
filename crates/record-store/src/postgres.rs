use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    RecordKey, Result, StoreError, StoredRecord, UpdateExpression, UpdateRejected,
    store::RecordStore,
};

/// PostgreSQL-backed record store.
///
/// Every logical table lives in the single `records` relation, keyed by
/// `(table_name, partition_key, sort_key)` with the document in a JSONB column.
#[derive(Clone)]
pub struct PostgresRecordStore {
    pool: PgPool,
}

impl PostgresRecordStore {
    /// Creates a new PostgreSQL record store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_record(row: PgRow) -> Result<StoredRecord> {
        let partition: String = row.try_get("partition_key")?;
        let sort: String = row.try_get("sort_key")?;
        let key = if sort.is_empty() {
            RecordKey::partition(partition)
        } else {
            RecordKey::composite(partition, sort)
        };

        Ok(StoredRecord {
            key,
            data: row.try_get("data")?,
        })
    }
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    async fn get(&self, table: &str, key: &RecordKey) -> Result<Option<Value>> {
        let data: Option<Value> = sqlx::query_scalar(
            r#"
            SELECT data FROM records
            WHERE table_name = $1 AND partition_key = $2 AND sort_key = $3
            "#,
        )
        .bind(table)
        .bind(&key.partition)
        .bind(key.sort_or_empty())
        .fetch_optional(&self.pool)
        .await?;

        Ok(data)
    }

    async fn put(&self, table: &str, key: &RecordKey, data: Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO records (table_name, partition_key, sort_key, data)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (table_name, partition_key, sort_key)
            DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()
            "#,
        )
        .bind(table)
        .bind(&key.partition)
        .bind(key.sort_or_empty())
        .bind(data)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self, key, update), fields(%key))]
    async fn update(
        &self,
        table: &str,
        key: &RecordKey,
        update: &UpdateExpression,
    ) -> Result<Value> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent conditional updates on the same key
        let current: Option<Value> = sqlx::query_scalar(
            r#"
            SELECT data FROM records
            WHERE table_name = $1 AND partition_key = $2 AND sort_key = $3
            FOR UPDATE
            "#,
        )
        .bind(table)
        .bind(&key.partition)
        .bind(key.sort_or_empty())
        .fetch_optional(&mut *tx)
        .await?;

        let mut data = current.ok_or_else(|| StoreError::NotFound {
            table: table.to_string(),
            key: key.clone(),
        })?;

        if let Err(rejected) = update.apply(&mut data) {
            tx.rollback().await?;
            return Err(match rejected {
                UpdateRejected::ConditionFailed => {
                    metrics::counter!("record_store_conditional_failures_total").increment(1);
                    StoreError::ConditionalCheckFailed {
                        table: table.to_string(),
                        key: key.clone(),
                    }
                }
                UpdateRejected::InvalidPath(path) => StoreError::InvalidPath {
                    table: table.to_string(),
                    key: key.clone(),
                    path,
                },
            });
        }

        sqlx::query(
            r#"
            UPDATE records SET data = $4, updated_at = NOW()
            WHERE table_name = $1 AND partition_key = $2 AND sort_key = $3
            "#,
        )
        .bind(table)
        .bind(&key.partition)
        .bind(key.sort_or_empty())
        .bind(&data)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(data)
    }

    async fn delete(&self, table: &str, key: &RecordKey) -> Result<()> {
        sqlx::query(
            "DELETE FROM records WHERE table_name = $1 AND partition_key = $2 AND sort_key = $3",
        )
        .bind(table)
        .bind(&key.partition)
        .bind(key.sort_or_empty())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn scan(&self, table: &str, partition: &str) -> Result<Vec<StoredRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT partition_key, sort_key, data FROM records
            WHERE table_name = $1 AND partition_key = $2
            ORDER BY sort_key ASC
            "#,
        )
        .bind(table)
        .bind(partition)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn batch_get(&self, table: &str, keys: &[RecordKey]) -> Result<Vec<StoredRecord>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let partitions: Vec<String> = keys.iter().map(|k| k.partition.clone()).collect();
        let sorts: Vec<String> = keys.iter().map(|k| k.sort_or_empty().to_string()).collect();

        let rows = sqlx::query(
            r#"
            SELECT r.partition_key, r.sort_key, r.data
            FROM records r
            JOIN UNNEST($2::text[], $3::text[]) AS k(partition_key, sort_key)
              ON r.partition_key = k.partition_key AND r.sort_key = k.sort_key
            WHERE r.table_name = $1
            "#,
        )
        .bind(table)
        .bind(&partitions)
        .bind(&sorts)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }
}
