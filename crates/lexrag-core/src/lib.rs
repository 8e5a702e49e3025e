//! # lexrag core
//!
//! Runtime-free logic for lexrag: the data model, boundary-preserving
//! chunking, the capability traits for embedding, generation and vector
//! storage, the ingestion pipeline and retrieval with context assembly.
//!
//! This crate contains no tokio, sqlx, HTTP or filesystem I/O. Concrete
//! clients and the SQLite store live in the `lexrag` app crate and are
//! injected through the traits defined here.
//!
//! ```text
//! raw text ─▶ chunk ─▶ EmbeddingClient ─▶ VectorStore::write
//! query    ─▶ EmbeddingClient ─▶ VectorStore::nearest_neighbors ─▶ context ─▶ GenerationClient
//! ```

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod ingest;
pub mod models;
pub mod retrieve;
pub mod store;
