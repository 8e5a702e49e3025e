//! In-memory [`VectorStore`] implementation for tests and embedding use.
//!
//! Collections live in a `HashMap` behind `std::sync::RwLock`. Search is
//! brute force over every record in the collection.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{StoreAdminError, StoreQueryError, StoreWriteError};
use crate::models::{IndexedRecord, NewRecord, QueryResultItem};

use super::{check_query_dims, rank_records, CollectionSchema, DistanceMetric, RecordField, VectorStore};

struct Collection {
    schema: CollectionSchema,
    records: Vec<IndexedRecord>,
}

/// In-memory vector store.
pub struct InMemoryStore {
    metric: DistanceMetric,
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryStore {
    pub fn new(metric: DistanceMetric) -> Self {
        Self {
            metric,
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Snapshot of every record in a collection, in write order.
    pub fn records(&self, collection: &str) -> Vec<IndexedRecord> {
        let guard = self
            .collections
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard
            .get(collection)
            .map(|c| c.records.clone())
            .unwrap_or_default()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(DistanceMetric::default())
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn ensure_collection_schema(
        &self,
        schema: &CollectionSchema,
    ) -> Result<bool, StoreAdminError> {
        let mut guard = self
            .collections
            .write()
            .map_err(|e| StoreAdminError::Backend(e.to_string()))?;
        if let Some(existing) = guard.get(&schema.name) {
            if existing.schema != *schema {
                return Err(StoreAdminError::SchemaConflict {
                    name: schema.name.clone(),
                });
            }
            return Ok(false);
        }
        guard.insert(
            schema.name.clone(),
            Collection {
                schema: schema.clone(),
                records: Vec::new(),
            },
        );
        Ok(true)
    }

    async fn write(&self, collection: &str, record: NewRecord) -> Result<String, StoreWriteError> {
        if record.vector.is_empty() {
            return Err(StoreWriteError::EmptyVector);
        }
        let mut guard = self
            .collections
            .write()
            .map_err(|e| StoreWriteError::Backend(e.to_string()))?;
        let target = guard
            .get_mut(collection)
            .ok_or_else(|| StoreWriteError::UnknownCollection(collection.to_string()))?;

        if let Some(first) = target.records.first() {
            if first.embedding.len() != record.vector.len() {
                return Err(StoreWriteError::DimensionMismatch {
                    expected: first.embedding.len(),
                    actual: record.vector.len(),
                });
            }
        }

        let id = Uuid::new_v4().to_string();
        target.records.push(IndexedRecord {
            id: id.clone(),
            title: record.title,
            content: record.content,
            source_file: record.source_file,
            page_number: record.page_number,
            embedding: record.vector,
            created_at: chrono::Utc::now().timestamp(),
        });
        Ok(id)
    }

    async fn nearest_neighbors(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
        fields: &[RecordField],
    ) -> Result<Vec<QueryResultItem>, StoreQueryError> {
        let guard = self
            .collections
            .read()
            .map_err(|e| StoreQueryError::Backend(e.to_string()))?;
        let target = guard
            .get(collection)
            .ok_or_else(|| StoreQueryError::UnknownCollection(collection.to_string()))?;
        check_query_dims(target.records.first().map(|r| r.embedding.len()), vector)?;
        Ok(rank_records(&target.records, vector, self.metric, k, fields))
    }

    async fn drop_collection(&self, name: &str) -> Result<(), StoreAdminError> {
        let mut guard = self
            .collections
            .write()
            .map_err(|e| StoreAdminError::Backend(e.to_string()))?;
        guard
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreAdminError::UnknownCollection(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ALL_FIELDS, DEFAULT_COLLECTION};

    fn new_record(content: &str, page: u32, vector: Vec<f32>) -> NewRecord {
        NewRecord {
            title: "lease".to_string(),
            content: content.to_string(),
            source_file: "/docs/lease.pdf".to_string(),
            page_number: page,
            vector,
        }
    }

    async fn store_with_schema() -> InMemoryStore {
        let store = InMemoryStore::default();
        store
            .ensure_collection_schema(&CollectionSchema::legal_document(DEFAULT_COLLECTION))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_ensure_schema_idempotent() {
        let store = InMemoryStore::default();
        let schema = CollectionSchema::legal_document(DEFAULT_COLLECTION);
        assert!(store.ensure_collection_schema(&schema).await.unwrap());
        assert!(!store.ensure_collection_schema(&schema).await.unwrap());
    }

    #[tokio::test]
    async fn test_write_requires_collection() {
        let store = InMemoryStore::default();
        let err = store
            .write("Missing", new_record("x", 1, vec![1.0]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreWriteError::UnknownCollection(_)));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let store = store_with_schema().await;
        store
            .write(DEFAULT_COLLECTION, new_record("a", 1, vec![1.0, 0.0]))
            .await
            .unwrap();
        let err = store
            .write(DEFAULT_COLLECTION, new_record("b", 2, vec![1.0, 0.0, 0.0]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreWriteError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn test_single_record_top1() {
        let store = store_with_schema().await;
        store
            .write(DEFAULT_COLLECTION, new_record("only clause", 1, vec![0.3, 0.7]))
            .await
            .unwrap();
        let results = store
            .nearest_neighbors(DEFAULT_COLLECTION, &[0.3, 0.7], 1, ALL_FIELDS)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].rank, 0);
        assert_eq!(results[0].content, "only clause");
        assert_eq!(results[0].page_number, 1);
        assert!(results[0].distance.abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_query_dimension_mismatch_rejected() {
        let store = store_with_schema().await;
        store
            .write(DEFAULT_COLLECTION, new_record("a", 1, vec![1.0, 0.0]))
            .await
            .unwrap();
        let err = store
            .nearest_neighbors(DEFAULT_COLLECTION, &[1.0, 0.0, 0.0], 1, ALL_FIELDS)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreQueryError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn test_empty_collection_accepts_any_query_dims() {
        let store = store_with_schema().await;
        let results = store
            .nearest_neighbors(DEFAULT_COLLECTION, &[1.0, 2.0, 3.0], 1, ALL_FIELDS)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_drop_collection_removes_records() {
        let store = store_with_schema().await;
        store
            .write(DEFAULT_COLLECTION, new_record("a", 1, vec![1.0]))
            .await
            .unwrap();
        store.drop_collection(DEFAULT_COLLECTION).await.unwrap();
        assert!(store.records(DEFAULT_COLLECTION).is_empty());
        assert!(store
            .nearest_neighbors(DEFAULT_COLLECTION, &[1.0], 1, ALL_FIELDS)
            .await
            .is_err());
        assert!(matches!(
            store.drop_collection(DEFAULT_COLLECTION).await,
            Err(StoreAdminError::UnknownCollection(_))
        ));
    }
}
