//! Error taxonomy for lexrag.
//!
//! Each external capability has its own error type so failures can be
//! attributed to the call that produced them. [`IngestionError`] and
//! [`RetrievalError`] wrap those with the context of the document or query
//! being processed.
//!
//! Every error exposes a stable [`kind`](IngestionError::kind) code, used by
//! the HTTP layer and CLI output, and reports whether a caller could
//! reasonably retry it.
//!
//! Chunking has no error type: empty or malformed input yields zero chunks.

use thiserror::Error;

/// Embedding provider failures.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    #[error("embedding request timed out after {0}s")]
    Timeout(u64),

    #[error("embedding provider error (status {status:?}): {message}")]
    Provider {
        status: Option<u16>,
        message: String,
        retryable: bool,
    },

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding provider is disabled")]
    Disabled,
}

impl EmbeddingError {
    pub fn kind(&self) -> &'static str {
        "embedding_error"
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::Timeout(_) => true,
            EmbeddingError::Provider { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

/// Failures persisting a record.
#[derive(Error, Debug)]
pub enum StoreWriteError {
    #[error("collection '{0}' does not exist")]
    UnknownCollection(String),

    #[error("embedding dimension mismatch: collection holds {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("empty embedding vector")]
    EmptyVector,

    #[error("store write failed: {0}")]
    Backend(String),
}

impl StoreWriteError {
    pub fn kind(&self) -> &'static str {
        "store_write_error"
    }
}

/// Failures running a nearest-neighbour query.
#[derive(Error, Debug)]
pub enum StoreQueryError {
    #[error("collection '{0}' does not exist")]
    UnknownCollection(String),

    #[error("query dimension mismatch: collection holds {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("store query failed: {0}")]
    Backend(String),
}

impl StoreQueryError {
    pub fn kind(&self) -> &'static str {
        "store_query_error"
    }
}

/// Failures in schema administration.
#[derive(Error, Debug)]
pub enum StoreAdminError {
    #[error("collection '{0}' does not exist")]
    UnknownCollection(String),

    #[error("collection '{name}' exists with a different schema")]
    SchemaConflict { name: String },

    #[error("store admin operation failed: {0}")]
    Backend(String),
}

impl StoreAdminError {
    pub fn kind(&self) -> &'static str {
        "store_admin_error"
    }
}

/// Answer generation failures.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    #[error("generation request timed out after {0}s")]
    Timeout(u64),

    #[error("generation provider error (status {status:?}): {message}")]
    Provider {
        status: Option<u16>,
        message: String,
        retryable: bool,
    },

    #[error("invalid generation response: {0}")]
    InvalidResponse(String),

    #[error("generation provider is disabled")]
    Disabled,
}

impl GenerationError {
    pub fn kind(&self) -> &'static str {
        "generation_error"
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Timeout(_) => true,
            GenerationError::Provider { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

/// Per-document ingestion failure, attributed to its source and chunk.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("{source_id}: no content to index")]
    NoContent { source_id: String },

    #[error("{source_id}: failed to embed full document: {error}")]
    DocumentEmbedding {
        source_id: String,
        #[source]
        error: EmbeddingError,
    },

    #[error("{source_id}: failed to embed chunk {ordinal}: {error}")]
    ChunkEmbedding {
        source_id: String,
        ordinal: u32,
        #[source]
        error: EmbeddingError,
    },

    #[error("{source_id}: failed to store chunk {ordinal}: {error}")]
    Store {
        source_id: String,
        ordinal: u32,
        #[source]
        error: StoreWriteError,
    },
}

impl IngestionError {
    /// Stable code of the underlying failure.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestionError::NoContent { .. } => "no_content",
            IngestionError::DocumentEmbedding { error, .. }
            | IngestionError::ChunkEmbedding { error, .. } => error.kind(),
            IngestionError::Store { error, .. } => error.kind(),
        }
    }

    pub fn source_id(&self) -> &str {
        match self {
            IngestionError::NoContent { source_id }
            | IngestionError::DocumentEmbedding { source_id, .. }
            | IngestionError::ChunkEmbedding { source_id, .. }
            | IngestionError::Store { source_id, .. } => source_id,
        }
    }

    /// Chunk ordinal the failure occurred on, if it was chunk-specific.
    pub fn ordinal(&self) -> Option<u32> {
        match self {
            IngestionError::ChunkEmbedding { ordinal, .. }
            | IngestionError::Store { ordinal, .. } => Some(*ordinal),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            IngestionError::DocumentEmbedding { error, .. }
            | IngestionError::ChunkEmbedding { error, .. } => error.is_retryable(),
            _ => false,
        }
    }
}

/// Query-time failures.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("failed to embed query: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("nearest-neighbour search failed: {0}")]
    Query(#[from] StoreQueryError),

    #[error("answer generation failed: {0}")]
    Generation(#[from] GenerationError),
}

impl RetrievalError {
    pub fn kind(&self) -> &'static str {
        match self {
            RetrievalError::EmptyQuery => "bad_request",
            RetrievalError::Embedding(e) => e.kind(),
            RetrievalError::Query(e) => e.kind(),
            RetrievalError::Generation(e) => e.kind(),
        }
    }
}
