//! Embedding client trait and vector utilities.
//!
//! Defines the [`EmbeddingClient`] capability that the ingestion pipeline
//! and retrieval consume, plus pure helpers for vector serialization and
//! similarity computation.
//!
//! Concrete clients (OpenAI, Ollama) live in the `lexrag` app crate.

use async_trait::async_trait;

use crate::error::EmbeddingError;

/// Opaque text → vector capability.
///
/// Implementations must return vectors of the same dimension for every
/// call, since a collection's distance comparisons rely on it.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Returns the expected dimensionality, if known up front.
    fn dims(&self) -> Option<usize>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Reject an empty vector or one whose length differs from `expected`.
pub fn check_dims(vector: &[f32], expected: Option<usize>) -> Result<(), EmbeddingError> {
    if vector.is_empty() {
        return Err(EmbeddingError::InvalidResponse(
            "provider returned an empty vector".to_string(),
        ));
    }
    match expected {
        Some(dims) if dims != vector.len() => Err(EmbeddingError::InvalidResponse(format!(
            "expected {} dimensions, got {}",
            dims,
            vector.len()
        ))),
        _ => Ok(()),
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use lexrag_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, vectors
/// of different lengths, and zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
