//! Query-time retrieval and context assembly.
//!
//! A query is embedded with the same [`EmbeddingClient`] used at ingestion,
//! the store returns the nearest records, and their contents are joined
//! into one context string bounded by a character budget. [`answer`]
//! additionally renders the prompt and calls the [`GenerationClient`].

use serde::Serialize;
use tracing::{debug, info};

use crate::embedding::EmbeddingClient;
use crate::error::RetrievalError;
use crate::generation::{build_prompt, GenerationClient};
use crate::models::QueryResultItem;
use crate::store::{VectorStore, ALL_FIELDS, DEFAULT_COLLECTION};

/// Default context budget in characters.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 24_000;
/// Separator placed between retrieved chunk contents.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone)]
pub struct RetrieveParams {
    pub collection: String,
    /// Number of neighbours requested. Values below 1 are treated as 1.
    pub top_k: usize,
    pub max_context_chars: usize,
}

impl Default for RetrieveParams {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            top_k: 1,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }
}

/// Assembled context plus the records it was built from.
#[derive(Debug, Clone, Serialize)]
pub struct Retrieval {
    pub context: String,
    pub sources: Vec<QueryResultItem>,
}

/// Generated answer plus its supporting records.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<QueryResultItem>,
}

/// Embed `query`, fetch the nearest records and assemble the context.
pub async fn retrieve(
    embedder: &dyn EmbeddingClient,
    store: &dyn VectorStore,
    query: &str,
    params: &RetrieveParams,
) -> Result<Retrieval, RetrievalError> {
    if query.trim().is_empty() {
        return Err(RetrievalError::EmptyQuery);
    }

    let vector = embedder.embed(query).await?;
    let sources = store
        .nearest_neighbors(&params.collection, &vector, params.top_k.max(1), ALL_FIELDS)
        .await?;
    debug!(hits = sources.len(), "nearest-neighbour search complete");

    let context = assemble_context(&sources, params.max_context_chars);
    Ok(Retrieval { context, sources })
}

/// Retrieve context for `query` and generate a grounded answer.
///
/// With no stored records the context is empty and the generator is still
/// called; the prompt tells it to say when the context is insufficient.
pub async fn answer(
    embedder: &dyn EmbeddingClient,
    store: &dyn VectorStore,
    generator: &dyn GenerationClient,
    query: &str,
    params: &RetrieveParams,
) -> Result<Answer, RetrievalError> {
    let Retrieval { context, sources } = retrieve(embedder, store, query, params).await?;
    let prompt = build_prompt(query, &context);
    let answer = generator.complete(&prompt).await?;
    info!(
        model = generator.model_name(),
        sources = sources.len(),
        "generated answer"
    );
    Ok(Answer { answer, sources })
}

/// Join record contents in rank order and cut to `max_chars` characters.
///
/// Truncation is a hard cut and may fall mid-chunk.
pub fn assemble_context(items: &[QueryResultItem], max_chars: usize) -> String {
    let joined = items
        .iter()
        .map(|item| item.content.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);
    match joined.char_indices().nth(max_chars) {
        Some((cut, _)) => joined[..cut].to_string(),
        None => joined,
    }
}
