//! Per-document ingestion pipeline.
//!
//! Coordinates chunking → embedding → storage for one document:
//!
//! 1. Chunk the full text; zero chunks fails with
//!    [`IngestionError::NoContent`] before any external call.
//! 2. Embed the untouched full text (whole-document embedding, reported
//!    back to the caller only).
//! 3. For each chunk, embed then write a record with
//!    `page_number = ordinal` and `source_file = source_id`.
//!
//! Chunks are independent, so step 3 runs with bounded concurrency. Every
//! embedding call made through one [`Ingestor`] takes a permit from a
//! single semaphore of `concurrency` permits, so the limit holds across
//! documents ingested in parallel too. Each record carries its own ordinal,
//! so the stored order is correct whatever order the writes complete in.
//! The first failure aborts the remaining chunks. Records already written
//! stay written.

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::chunk::chunk_document;
use crate::embedding::EmbeddingClient;
use crate::error::{EmbeddingError, IngestionError, StoreAdminError};
use crate::models::{Chunk, NewRecord};
use crate::store::{CollectionSchema, VectorStore, DEFAULT_COLLECTION};

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 3000;
/// Default number of characters in the report preview.
pub const DEFAULT_PREVIEW_CHARS: usize = 500;

/// Pipeline tuning, decoupled from application config.
#[derive(Debug, Clone)]
pub struct IngestParams {
    /// Target collection.
    pub collection: String,
    /// Maximum chunk size in characters.
    pub max_chunk_size: usize,
    /// Maximum embedding calls in flight across every document.
    pub concurrency: usize,
    /// Characters of the full text included in the report preview.
    pub preview_chars: usize,
}

impl Default for IngestParams {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            max_chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: 1,
            preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }
}

/// One document to ingest.
#[derive(Debug, Clone)]
pub struct DocumentInput<'a> {
    /// Stored as each record's `source_file`.
    pub source_id: &'a str,
    /// Stored as each record's `title`.
    pub title: &'a str,
    pub full_text: &'a str,
    pub page_count: u32,
}

/// Reporting data returned after a document is indexed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub source_id: String,
    /// Whole-document embedding.
    pub embedding: Vec<f32>,
    /// Leading characters of the full text followed by `...`.
    pub text: String,
    pub pages: u32,
    pub chunks: usize,
    /// Store handles, indexed by `ordinal - 1`.
    pub record_ids: Vec<String>,
}

/// Ingestion pipeline over injected embedding and storage capabilities.
pub struct Ingestor {
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    params: IngestParams,
    embed_permits: Semaphore,
}

impl Ingestor {
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
        params: IngestParams,
    ) -> Self {
        let embed_permits = Semaphore::new(params.concurrency.max(1));
        Self {
            embedder,
            store,
            params,
            embed_permits,
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        // The semaphore is never closed, so acquire cannot fail.
        let _permit = self.embed_permits.acquire().await.ok();
        self.embedder.embed(text).await
    }

    /// Create the target collection if needed. Returns `true` if created.
    pub async fn ensure_schema(&self) -> Result<bool, StoreAdminError> {
        let schema = CollectionSchema::legal_document(&self.params.collection);
        let created = self.store.ensure_collection_schema(&schema).await?;
        if created {
            info!(collection = %schema.name, "created collection schema");
        }
        Ok(created)
    }

    /// Drop the target collection and recreate an empty schema.
    ///
    /// A collection that does not exist yet is treated as already reset.
    pub async fn reset(&self) -> Result<(), StoreAdminError> {
        match self.store.drop_collection(&self.params.collection).await {
            Ok(()) | Err(StoreAdminError::UnknownCollection(_)) => {}
            Err(e) => return Err(e),
        }
        self.ensure_schema().await?;
        Ok(())
    }

    /// Chunk, embed and store one document.
    pub async fn ingest(&self, doc: &DocumentInput<'_>) -> Result<IngestReport, IngestionError> {
        let chunks = chunk_document(doc.source_id, doc.full_text, self.params.max_chunk_size);
        if chunks.is_empty() {
            return Err(IngestionError::NoContent {
                source_id: doc.source_id.to_string(),
            });
        }
        info!(
            source = doc.source_id,
            chunks = chunks.len(),
            "split document into chunks"
        );

        let embedding = self.embed(doc.full_text).await.map_err(|error| {
            IngestionError::DocumentEmbedding {
                source_id: doc.source_id.to_string(),
                error,
            }
        })?;

        let record_ids: Vec<String> = stream::iter(0..chunks.len())
            .map(|i| self.index_chunk(doc.title, &chunks[i]))
            .buffered(self.params.concurrency.max(1))
            .try_collect()
            .await?;

        info!(
            source = doc.source_id,
            records = record_ids.len(),
            "indexed document"
        );

        Ok(IngestReport {
            source_id: doc.source_id.to_string(),
            embedding,
            text: preview(doc.full_text, self.params.preview_chars),
            pages: doc.page_count,
            chunks: chunks.len(),
            record_ids,
        })
    }

    /// Ingest raw text that has no page structure of its own.
    pub async fn ingest_text(
        &self,
        source_id: &str,
        title: &str,
        text: &str,
    ) -> Result<IngestReport, IngestionError> {
        self.ingest(&DocumentInput {
            source_id,
            title,
            full_text: text,
            page_count: 1,
        })
        .await
    }

    async fn index_chunk(&self, title: &str, chunk: &Chunk) -> Result<String, IngestionError> {
        let vector = self.embed(&chunk.text).await.map_err(|error| {
            IngestionError::ChunkEmbedding {
                source_id: chunk.source_id.clone(),
                ordinal: chunk.ordinal,
                error,
            }
        })?;

        let record = NewRecord {
            title: title.to_string(),
            content: chunk.text.clone(),
            source_file: chunk.source_id.clone(),
            page_number: chunk.ordinal,
            vector,
        };
        let id = self
            .store
            .write(&self.params.collection, record)
            .await
            .map_err(|error| IngestionError::Store {
                source_id: chunk.source_id.clone(),
                ordinal: chunk.ordinal,
                error,
            })?;

        debug!(source = %chunk.source_id, ordinal = chunk.ordinal, record = %id, "stored chunk");
        Ok(id)
    }
}

/// First `max_chars` characters of `text` followed by `...`.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Embeds text as `[len, 1]`, counting calls. Fails on a text equal to `fail_on`.
    struct CountingEmbedder {
        calls: AtomicUsize,
        fail_on: Option<&'static str>,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on: None,
            }
        }
    }

    #[async_trait]
    impl EmbeddingClient for CountingEmbedder {
        fn model_name(&self) -> &str {
            "counting"
        }
        fn dims(&self) -> Option<usize> {
            Some(2)
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(marker) = self.fail_on {
                if text == marker {
                    return Err(EmbeddingError::Provider {
                        status: Some(500),
                        message: "boom".to_string(),
                        retryable: true,
                    });
                }
            }
            // Later chunks finish first, so completion order differs from ordinal order.
            let delay = 20u64.saturating_sub(text.len() as u64 % 20);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    async fn ingestor(embedder: Arc<CountingEmbedder>, concurrency: usize) -> (Ingestor, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::default());
        let params = IngestParams {
            max_chunk_size: 40,
            concurrency,
            ..IngestParams::default()
        };
        let ingestor = Ingestor::new(embedder, store.clone(), params);
        ingestor.ensure_schema().await.unwrap();
        (ingestor, store)
    }

    fn doc(text: &str) -> DocumentInput<'_> {
        DocumentInput {
            source_id: "/docs/lease.pdf",
            title: "lease",
            full_text: text,
            page_count: 2,
        }
    }

    const TEXT: &str = "First clause of lease.\n\nSecond clause here.\n\nThird clause text.\n\nFourth clause ends.";

    #[tokio::test]
    async fn test_empty_document_is_no_content() {
        let embedder = Arc::new(CountingEmbedder::new());
        let (ingestor, store) = ingestor(embedder.clone(), 1).await;
        let err = ingestor.ingest(&doc("")).await.unwrap_err();
        assert!(matches!(err, IngestionError::NoContent { .. }));
        assert!(err.to_string().contains("no content to index"));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert!(store.records(DEFAULT_COLLECTION).is_empty());
    }

    #[tokio::test]
    async fn test_ingest_stores_chunks_with_ordinals() {
        let embedder = Arc::new(CountingEmbedder::new());
        let (ingestor, store) = ingestor(embedder.clone(), 1).await;
        let report = ingestor.ingest(&doc(TEXT)).await.unwrap();

        assert_eq!(report.chunks, 4);
        assert_eq!(report.record_ids.len(), 4);
        assert_eq!(report.pages, 2);
        assert_eq!(report.embedding, vec![TEXT.len() as f32, 1.0]);
        // one whole-document call plus one per chunk
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 5);

        let records = store.records(DEFAULT_COLLECTION);
        assert_eq!(records.len(), 4);
        for r in &records {
            assert_eq!(r.source_file, "/docs/lease.pdf");
            assert_eq!(r.title, "lease");
        }
        let third = records.iter().find(|r| r.page_number == 3).unwrap();
        assert_eq!(third.content, "Third clause text.");
    }

    #[tokio::test]
    async fn test_concurrent_ingest_keeps_ordinals() {
        let embedder = Arc::new(CountingEmbedder::new());
        let (ingestor, store) = ingestor(embedder, 4).await;
        let report = ingestor.ingest(&doc(TEXT)).await.unwrap();

        let records = store.records(DEFAULT_COLLECTION);
        let expected = ["First clause of lease.", "Second clause here.", "Third clause text.", "Fourth clause ends."];
        for (i, text) in expected.iter().enumerate() {
            let r = records.iter().find(|r| r.content == *text).unwrap();
            assert_eq!(r.page_number, (i + 1) as u32);
            assert_eq!(report.record_ids[i], r.id);
        }
    }

    #[tokio::test]
    async fn test_document_embedding_failure_stores_nothing() {
        let embedder = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
            fail_on: Some(TEXT),
        });
        let (ingestor, store) = ingestor(embedder.clone(), 1).await;
        let err = ingestor.ingest(&doc(TEXT)).await.unwrap_err();
        assert!(matches!(err, IngestionError::DocumentEmbedding { .. }));
        assert!(err.is_retryable());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        assert!(store.records(DEFAULT_COLLECTION).is_empty());
    }

    #[tokio::test]
    async fn test_chunk_failure_is_attributed_and_keeps_earlier_records() {
        let embedder = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
            fail_on: Some("Third clause text."),
        });
        let (ingestor, store) = ingestor(embedder, 1).await;
        let err = ingestor.ingest(&doc(TEXT)).await.unwrap_err();
        match &err {
            IngestionError::ChunkEmbedding {
                source_id, ordinal, ..
            } => {
                assert_eq!(source_id, "/docs/lease.pdf");
                assert_eq!(*ordinal, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.ordinal(), Some(3));

        // Sequential processing: chunks 1 and 2 were written before the failure.
        let pages: Vec<u32> = store
            .records(DEFAULT_COLLECTION)
            .iter()
            .map(|r| r.page_number)
            .collect();
        assert_eq!(pages, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_store_failure_is_attributed() {
        let embedder = Arc::new(CountingEmbedder::new());
        let store = Arc::new(InMemoryStore::default());
        // No schema: every write fails with UnknownCollection.
        let ingestor = Ingestor::new(
            embedder,
            store,
            IngestParams {
                max_chunk_size: 40,
                ..IngestParams::default()
            },
        );
        let err = ingestor.ingest(&doc(TEXT)).await.unwrap_err();
        assert!(matches!(err, IngestionError::Store { ordinal: 1, .. }));
    }

    #[tokio::test]
    async fn test_reset_empties_collection() {
        let embedder = Arc::new(CountingEmbedder::new());
        let (ingestor, store) = ingestor(embedder, 2).await;
        ingestor.ingest(&doc(TEXT)).await.unwrap();
        assert_eq!(store.records(DEFAULT_COLLECTION).len(), 4);

        ingestor.reset().await.unwrap();
        assert!(store.records(DEFAULT_COLLECTION).is_empty());
        // schema recreated, so ingestion works again
        ingestor.ingest(&doc(TEXT)).await.unwrap();
        assert_eq!(store.records(DEFAULT_COLLECTION).len(), 4);
    }

    #[tokio::test]
    async fn test_reingest_duplicates_records() {
        let embedder = Arc::new(CountingEmbedder::new());
        let (ingestor, store) = ingestor(embedder, 1).await;
        ingestor.ingest(&doc(TEXT)).await.unwrap();
        ingestor.ingest(&doc(TEXT)).await.unwrap();
        assert_eq!(store.records(DEFAULT_COLLECTION).len(), 8);
    }

    #[test]
    fn test_preview_truncates_by_chars() {
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("ab", 3), "ab...");
        assert_eq!(preview("ééé", 2), "éé...");
    }

    fn assert_send<T: Send>(_: T) {}

    #[tokio::test]
    async fn test_ingest_future_is_send() {
        let (ingestor, _store) = ingestor(Arc::new(CountingEmbedder::new()), 2).await;
        assert_send(ingestor.ingest(&doc(TEXT)));

        // Spawning needs the future to be Send for every borrow lifetime.
        let ingestor = Arc::new(ingestor);
        let report = tokio::spawn(async move { ingestor.ingest_text("a.txt", "a", TEXT).await })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.chunks, 4);
    }

    /// Tracks how many `embed` calls are running at once.
    struct GaugeEmbedder {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingClient for GaugeEmbedder {
        fn model_name(&self) -> &str {
            "gauge"
        }
        fn dims(&self) -> Option<usize> {
            Some(1)
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![1.0])
        }
    }

    #[tokio::test]
    async fn test_concurrency_limit_spans_documents() {
        let embedder = Arc::new(GaugeEmbedder {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let store = Arc::new(InMemoryStore::default());
        let params = IngestParams {
            max_chunk_size: 40,
            concurrency: 2,
            ..IngestParams::default()
        };
        let ingestor = Ingestor::new(embedder.clone(), store.clone(), params);
        ingestor.ensure_schema().await.unwrap();

        let docs: Vec<String> = (0..4).map(|i| format!("doc{}.txt", i)).collect();
        let runs = docs.iter().map(|id| ingestor.ingest_text(id, id, TEXT));
        let reports = futures::future::join_all(runs).await;

        assert!(reports.iter().all(|r| r.is_ok()));
        assert_eq!(store.records(DEFAULT_COLLECTION).len(), 16);
        assert_eq!(embedder.peak.load(Ordering::SeqCst), 2);
    }
}
