//! Core data models used throughout lexrag.
//!
//! These types represent the chunks, stored records and query results that
//! flow through the ingestion and retrieval pipeline.

use serde::Serialize;

/// Page number written when a record has no meaningful position.
pub const UNSPECIFIED_PAGE: u32 = 0;

/// A contiguous slice of a source document's text.
///
/// Produced by [`chunk_document`](crate::chunk::chunk_document) and consumed
/// immediately by the ingestion pipeline. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Identifier of the originating document (filename or path).
    pub source_id: String,
    /// 1-based position within the source document.
    pub ordinal: u32,
    /// Trimmed, non-empty chunk text.
    pub text: String,
}

/// Payload handed to [`VectorStore::write`](crate::store::VectorStore::write).
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub title: String,
    pub content: String,
    pub source_file: String,
    /// Chunk ordinal, or [`UNSPECIFIED_PAGE`].
    pub page_number: u32,
    pub vector: Vec<f32>,
}

/// A chunk bound to its embedding, as persisted in a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedRecord {
    /// Store-assigned record handle.
    pub id: String,
    pub title: String,
    pub content: String,
    pub source_file: String,
    pub page_number: u32,
    pub embedding: Vec<f32>,
    /// Unix timestamp (seconds) of the write.
    pub created_at: i64,
}

/// Retrieval-time view of an [`IndexedRecord`] plus its distance to the query.
///
/// Serialized in the camelCase shape returned by the query endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResultItem {
    /// 0-based position in the store's ranking.
    pub rank: usize,
    pub title: String,
    pub content: String,
    pub source_file: String,
    pub page_number: u32,
    /// Provider-defined distance; lower means more similar.
    pub distance: f64,
}
