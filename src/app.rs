//! Process-wide resources.
//!
//! [`App`] is built once at startup from [`Config`] and passed explicitly to
//! the CLI commands and the HTTP server. It owns the single store handle and
//! the external clients.

use std::sync::Arc;

use anyhow::{Context, Result};
use lexrag_core::embedding::EmbeddingClient;
use lexrag_core::generation::GenerationClient;
use lexrag_core::ingest::{IngestParams, Ingestor};
use lexrag_core::retrieve::RetrieveParams;
use lexrag_core::store::VectorStore;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::generation::create_generator;
use crate::sqlite_store::SqliteStore;

pub struct App {
    pub config: Config,
    pub embedder: Arc<dyn EmbeddingClient>,
    pub generator: Arc<dyn GenerationClient>,
    pub store: Arc<dyn VectorStore>,
    pub ingestor: Ingestor,
}

impl App {
    /// Open the SQLite store and construct the configured clients.
    pub async fn open(config: Config) -> Result<Self> {
        let store = SqliteStore::open(&config)
            .await
            .context("Failed to open vector store")?;
        let embedder =
            create_embedder(&config.embedding).context("Failed to create embedding client")?;
        let generator =
            create_generator(&config.generation).context("Failed to create generation client")?;
        Ok(Self::with_clients(config, embedder, generator, Arc::new(store)))
    }

    /// Assemble from already-constructed clients.
    pub fn with_clients(
        config: Config,
        embedder: Arc<dyn EmbeddingClient>,
        generator: Arc<dyn GenerationClient>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        let params = IngestParams {
            collection: config.store.collection.clone(),
            max_chunk_size: config.chunking.max_chars,
            concurrency: config.ingest.concurrency,
            preview_chars: config.ingest.preview_chars,
        };
        let ingestor = Ingestor::new(embedder.clone(), store.clone(), params);
        Self {
            config,
            embedder,
            generator,
            store,
            ingestor,
        }
    }

    /// Retrieval parameters from config, with an optional `top_k` override.
    pub fn retrieve_params(&self, top_k: Option<usize>) -> RetrieveParams {
        RetrieveParams {
            collection: self.config.store.collection.clone(),
            top_k: top_k.unwrap_or(self.config.retrieval.top_k).max(1),
            max_context_chars: self.config.retrieval.max_context_chars,
        }
    }
}
