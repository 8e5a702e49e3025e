//! Vector storage abstraction.
//!
//! The [`VectorStore`] trait defines the four operations the pipeline needs
//! from a vector database: schema bootstrap, record writes, nearest-neighbour
//! queries and a destructive collection reset. Backends are pluggable
//! (SQLite in the app crate, [`memory::InMemoryStore`] here).
//!
//! The distance metric is backend configuration ([`DistanceMetric`]);
//! callers only consume the ordering and the numeric distance returned.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{StoreAdminError, StoreQueryError, StoreWriteError};
use crate::models::{IndexedRecord, NewRecord, QueryResultItem};

/// Default collection name for legal documents.
pub const DEFAULT_COLLECTION: &str = "LegalDocument";

/// Storage type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Short, exact-match string.
    String,
    /// Long-form text.
    Text,
    Number,
}

/// One property of a collection schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

/// Named set of fields stored alongside each vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl CollectionSchema {
    /// The `{title, content, sourceFile, pageNumber}` schema used for chunks.
    pub fn legal_document(name: &str) -> Self {
        let field = |name: &str, kind| FieldSpec {
            name: name.to_string(),
            kind,
        };
        Self {
            name: name.to_string(),
            fields: vec![
                field("title", FieldKind::String),
                field("content", FieldKind::Text),
                field("sourceFile", FieldKind::String),
                field("pageNumber", FieldKind::Number),
            ],
        }
    }
}

/// Record fields a query can ask to have returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    Title,
    Content,
    SourceFile,
    PageNumber,
}

/// Every payload field.
pub const ALL_FIELDS: &[RecordField] = &[
    RecordField::Title,
    RecordField::Content,
    RecordField::SourceFile,
    RecordField::PageNumber,
];

/// Distance function used to rank stored vectors. Lower is closer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cosine_similarity`, in `[0, 2]`.
    #[default]
    Cosine,
    /// Euclidean distance.
    L2,
    /// Negated dot product.
    Dot,
}

impl DistanceMetric {
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f64 {
        match self {
            DistanceMetric::Cosine => 1.0 - crate::embedding::cosine_similarity(a, b) as f64,
            DistanceMetric::L2 => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| ((x - y) as f64).powi(2))
                .sum::<f64>()
                .sqrt(),
            DistanceMetric::Dot => -a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x * y) as f64)
                .sum::<f64>(),
        }
    }
}

/// Abstract vector store.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`ensure_collection_schema`](VectorStore::ensure_collection_schema) | Idempotent schema bootstrap |
/// | [`write`](VectorStore::write) | Persist one record, returning its handle |
/// | [`nearest_neighbors`](VectorStore::nearest_neighbors) | Ranked k-NN by ascending distance |
/// | [`drop_collection`](VectorStore::drop_collection) | Remove a collection and all its records |
///
/// Implementations must be safe for concurrent use from a shared handle.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection if it does not exist.
    ///
    /// Returns `true` if it was created, `false` if it was already present.
    async fn ensure_collection_schema(
        &self,
        schema: &CollectionSchema,
    ) -> Result<bool, StoreAdminError>;

    /// Persist a record and return its handle.
    async fn write(&self, collection: &str, record: NewRecord) -> Result<String, StoreWriteError>;

    /// Return up to `k` records ordered by ascending distance to `vector`.
    ///
    /// Fields not listed in `fields` are returned empty (or
    /// [`UNSPECIFIED_PAGE`](crate::models::UNSPECIFIED_PAGE)).
    async fn nearest_neighbors(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
        fields: &[RecordField],
    ) -> Result<Vec<QueryResultItem>, StoreQueryError>;

    /// Remove a collection, its schema and every record in it.
    async fn drop_collection(&self, name: &str) -> Result<(), StoreAdminError>;
}

/// Reject a query vector whose length differs from the collection's.
///
/// `collection_dims` is `None` for an empty collection, which accepts any
/// query.
pub fn check_query_dims(
    collection_dims: Option<usize>,
    query: &[f32],
) -> Result<(), StoreQueryError> {
    match collection_dims {
        Some(expected) if expected != query.len() => Err(StoreQueryError::DimensionMismatch {
            expected,
            actual: query.len(),
        }),
        _ => Ok(()),
    }
}

/// Rank records by distance to `query` and project the requested fields.
///
/// Ties keep insertion order, so the result is deterministic.
pub fn rank_records<'a, I>(
    records: I,
    query: &[f32],
    metric: DistanceMetric,
    k: usize,
    fields: &[RecordField],
) -> Vec<QueryResultItem>
where
    I: IntoIterator<Item = &'a IndexedRecord>,
{
    let mut scored: Vec<(f64, &IndexedRecord)> = records
        .into_iter()
        .map(|r| (metric.distance(query, &r.embedding), r))
        .collect();
    scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);

    scored
        .into_iter()
        .enumerate()
        .map(|(rank, (distance, record))| project(record, fields, rank, distance))
        .collect()
}

/// Build a [`QueryResultItem`] carrying only the requested fields.
pub fn project(
    record: &IndexedRecord,
    fields: &[RecordField],
    rank: usize,
    distance: f64,
) -> QueryResultItem {
    let want = |f: RecordField| fields.contains(&f);
    QueryResultItem {
        rank,
        title: if want(RecordField::Title) {
            record.title.clone()
        } else {
            String::new()
        },
        content: if want(RecordField::Content) {
            record.content.clone()
        } else {
            String::new()
        },
        source_file: if want(RecordField::SourceFile) {
            record.source_file.clone()
        } else {
            String::new()
        },
        page_number: if want(RecordField::PageNumber) {
            record.page_number
        } else {
            crate::models::UNSPECIFIED_PAGE
        },
        distance,
    }
}
