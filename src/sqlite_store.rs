//! SQLite-backed [`VectorStore`].
//!
//! Records live in the `records` table with their embedding encoded as a
//! little-endian f32 BLOB. Nearest-neighbour search loads the collection's
//! vectors and ranks them in process with the configured
//! [`DistanceMetric`], the same brute-force strategy as
//! [`InMemoryStore`](lexrag_core::store::memory::InMemoryStore).

use async_trait::async_trait;
use lexrag_core::embedding::{blob_to_vec, vec_to_blob};
use lexrag_core::error::{StoreAdminError, StoreQueryError, StoreWriteError};
use lexrag_core::models::{IndexedRecord, NewRecord, QueryResultItem};
use lexrag_core::store::{
    check_query_dims, rank_records, CollectionSchema, DistanceMetric, FieldSpec, RecordField,
    VectorStore,
};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::migrate::run_migrations;

type RecordRow = (String, String, String, String, i64, Vec<u8>, i64);

/// Vector store persisted in a SQLite database.
///
/// The pool is opened once and shared; it is safe for concurrent use.
pub struct SqliteStore {
    pool: SqlitePool,
    metric: DistanceMetric,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, metric: DistanceMetric) -> Self {
        Self { pool, metric }
    }

    /// Open the configured database and run migrations.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(config).await?;
        run_migrations(&pool).await?;
        Ok(Self::new(pool, config.store.distance))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn collection_exists(&self, name: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) > 0 FROM collections WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await
    }

    /// Number of records stored in a collection.
    pub async fn count(&self, collection: &str) -> Result<i64, StoreQueryError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection = ?")
            .bind(collection)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreQueryError::Backend(e.to_string()))
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn ensure_collection_schema(
        &self,
        schema: &CollectionSchema,
    ) -> Result<bool, StoreAdminError> {
        let backend = |e: sqlx::Error| StoreAdminError::Backend(e.to_string());

        let existing: Option<String> =
            sqlx::query_scalar("SELECT fields_json FROM collections WHERE name = ?")
                .bind(&schema.name)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;

        if let Some(fields_json) = existing {
            let fields: Vec<FieldSpec> = serde_json::from_str(&fields_json)
                .map_err(|e| StoreAdminError::Backend(e.to_string()))?;
            if fields != schema.fields {
                return Err(StoreAdminError::SchemaConflict {
                    name: schema.name.clone(),
                });
            }
            return Ok(false);
        }

        let fields_json = serde_json::to_string(&schema.fields)
            .map_err(|e| StoreAdminError::Backend(e.to_string()))?;
        // OR IGNORE: a concurrent bootstrap of the same schema is not an error.
        let result = sqlx::query(
            "INSERT OR IGNORE INTO collections (name, fields_json, created_at) VALUES (?, ?, ?)",
        )
        .bind(&schema.name)
        .bind(&fields_json)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(result.rows_affected() > 0)
    }

    async fn write(&self, collection: &str, record: NewRecord) -> Result<String, StoreWriteError> {
        let backend = |e: sqlx::Error| StoreWriteError::Backend(e.to_string());

        if record.vector.is_empty() {
            return Err(StoreWriteError::EmptyVector);
        }
        // Collection existence and the dimension check are conditions of the
        // INSERT itself, so concurrent first writes cannot both pass them.
        let id = Uuid::new_v4().to_string();
        let dims = record.vector.len() as i64;
        let inserted = sqlx::query(
            r#"
            INSERT INTO records
                (id, collection, title, content, source_file, page_number, dims, embedding, created_at)
            SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?
            WHERE EXISTS (SELECT 1 FROM collections WHERE name = ?)
              AND NOT EXISTS (SELECT 1 FROM records WHERE collection = ? AND dims != ?)
            "#,
        )
        .bind(&id)
        .bind(collection)
        .bind(&record.title)
        .bind(&record.content)
        .bind(&record.source_file)
        .bind(record.page_number as i64)
        .bind(dims)
        .bind(vec_to_blob(&record.vector))
        .bind(chrono::Utc::now().timestamp())
        .bind(collection)
        .bind(collection)
        .bind(dims)
        .execute(&self.pool)
        .await
        .map_err(backend)?
        .rows_affected();

        if inserted == 0 {
            if !self.collection_exists(collection).await.map_err(backend)? {
                return Err(StoreWriteError::UnknownCollection(collection.to_string()));
            }
            let existing: Option<i64> = sqlx::query_scalar(
                "SELECT dims FROM records WHERE collection = ? AND dims != ? LIMIT 1",
            )
            .bind(collection)
            .bind(dims)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
            return Err(match existing {
                Some(expected) => StoreWriteError::DimensionMismatch {
                    expected: expected as usize,
                    actual: record.vector.len(),
                },
                None => StoreWriteError::Backend("record was not written".to_string()),
            });
        }

        Ok(id)
    }

    async fn nearest_neighbors(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
        fields: &[RecordField],
    ) -> Result<Vec<QueryResultItem>, StoreQueryError> {
        let backend = |e: sqlx::Error| StoreQueryError::Backend(e.to_string());

        if !self.collection_exists(collection).await.map_err(backend)? {
            return Err(StoreQueryError::UnknownCollection(collection.to_string()));
        }

        let collection_dims: Option<i64> =
            sqlx::query_scalar("SELECT dims FROM records WHERE collection = ? LIMIT 1")
                .bind(collection)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;
        check_query_dims(collection_dims.map(|d| d as usize), vector)?;

        let rows: Vec<RecordRow> = sqlx::query_as(
            r#"
            SELECT id, title, content, source_file, page_number, embedding, created_at
            FROM records
            WHERE collection = ?
            ORDER BY rowid
            "#,
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let records: Vec<IndexedRecord> = rows
            .into_iter()
            .map(
                |(id, title, content, source_file, page_number, blob, created_at)| IndexedRecord {
                    id,
                    title,
                    content,
                    source_file,
                    page_number: page_number.clamp(0, u32::MAX as i64) as u32,
                    embedding: blob_to_vec(&blob),
                    created_at,
                },
            )
            .collect();

        Ok(rank_records(&records, vector, self.metric, k, fields))
    }

    async fn drop_collection(&self, name: &str) -> Result<(), StoreAdminError> {
        let backend = |e: sqlx::Error| StoreAdminError::Backend(e.to_string());

        let mut tx = self.pool.begin().await.map_err(backend)?;
        sqlx::query("DELETE FROM records WHERE collection = ?")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        let removed = sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(backend)?
            .rows_affected();

        if removed == 0 {
            tx.rollback().await.map_err(backend)?;
            return Err(StoreAdminError::UnknownCollection(name.to_string()));
        }
        tx.commit().await.map_err(backend)?;
        Ok(())
    }
}
