//! Embedding client implementations.
//!
//! Concrete [`EmbeddingClient`]s selected by `[embedding].provider`:
//! - **[`DisabledEmbedder`]**: fails every call; used when embeddings are not configured.
//! - **[`OpenAiEmbedder`]**: `POST {url}/embeddings` with bearer auth.
//! - **[`OllamaEmbedder`]**: `POST {url}/api/embed` on a local Ollama instance.
//!
//! Both remote clients retry 429/5xx/network failures with exponential
//! backoff (see [`crate::http`]) and validate returned vectors against
//! `embedding.dims` when it is set.

use std::sync::Arc;

use async_trait::async_trait;
use lexrag_core::embedding::{check_dims, EmbeddingClient};
use lexrag_core::error::EmbeddingError;

use crate::config::EmbeddingConfig;
use crate::http::{build_client, post_json, CallFailure, RetryPolicy};

pub const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1";
pub const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

/// Map a transport failure onto the embedding error taxonomy.
fn classify(failure: CallFailure, timeout_secs: u64) -> EmbeddingError {
    match failure {
        CallFailure::Timeout => EmbeddingError::Timeout(timeout_secs),
        CallFailure::Status {
            status,
            body,
            retryable,
        } => EmbeddingError::Provider {
            status: Some(status),
            message: body,
            retryable,
        },
        CallFailure::Network(message) => EmbeddingError::Provider {
            status: None,
            message,
            retryable: true,
        },
        CallFailure::Decode(message) => EmbeddingError::InvalidResponse(message),
    }
}

fn parse_vector(value: &serde_json::Value) -> Result<Vec<f32>, EmbeddingError> {
    value
        .as_array()
        .ok_or_else(|| EmbeddingError::InvalidResponse("embedding is not an array".to_string()))?
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect::<Option<Vec<f32>>>()
        .ok_or_else(|| EmbeddingError::InvalidResponse("embedding has non-numeric values".to_string()))
}

// ============ Disabled ============

/// Embedder that rejects every call.
pub struct DisabledEmbedder;

#[async_trait]
impl EmbeddingClient for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> Option<usize> {
        None
    }
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Disabled)
    }
}

// ============ OpenAI ============

/// Embedder backed by the OpenAI embeddings API.
///
/// Requires `OPENAI_API_KEY` in the environment (see [`OpenAiEmbedder::new`]).
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    dims: Option<usize>,
    timeout_secs: u64,
    retry: RetryPolicy,
}

impl OpenAiEmbedder {
    /// Build from config, reading the key from `OPENAI_API_KEY`.
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            EmbeddingError::MissingCredentials("OPENAI_API_KEY environment variable not set".into())
        })?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &EmbeddingConfig, api_key: String) -> Result<Self, EmbeddingError> {
        if api_key.trim().is_empty() {
            return Err(EmbeddingError::MissingCredentials(
                "OpenAI API key is empty".into(),
            ));
        }
        let client = build_client(config.timeout_secs).map_err(EmbeddingError::InvalidResponse)?;
        Ok(Self {
            client,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_DEFAULT_URL.to_string()),
            api_key,
            model: config.model.clone(),
            dims: config.dims,
            timeout_secs: config.timeout_secs,
            retry: RetryPolicy::new(config.max_retries),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> Option<usize> {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });
        let url = format!("{}/embeddings", self.url.trim_end_matches('/'));
        let json = post_json(&self.client, &url, Some(&self.api_key), &body, self.retry)
            .await
            .map_err(|f| classify(f, self.timeout_secs))?;

        let embedding = json
            .get("data")
            .and_then(|d| d.as_array())
            .and_then(|d| d.first())
            .and_then(|item| item.get("embedding"))
            .ok_or_else(|| {
                EmbeddingError::InvalidResponse("missing data[0].embedding".to_string())
            })?;
        let vector = parse_vector(embedding)?;
        check_dims(&vector, self.dims)?;
        Ok(vector)
    }
}

// ============ Ollama ============

/// Embedder backed by a local Ollama instance.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: Option<usize>,
    timeout_secs: u64,
    retry: RetryPolicy,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = build_client(config.timeout_secs).map_err(EmbeddingError::InvalidResponse)?;
        Ok(Self {
            client,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| OLLAMA_DEFAULT_URL.to_string()),
            model: config.model.clone(),
            dims: config.dims,
            timeout_secs: config.timeout_secs,
            retry: RetryPolicy::new(config.max_retries),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> Option<usize> {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });
        let url = format!("{}/api/embed", self.url.trim_end_matches('/'));
        let json = post_json(&self.client, &url, None, &body, self.retry)
            .await
            .map_err(|f| classify(f, self.timeout_secs))?;

        let embedding = json
            .get("embeddings")
            .and_then(|e| e.as_array())
            .and_then(|e| e.first())
            .ok_or_else(|| EmbeddingError::InvalidResponse("missing embeddings[0]".to_string()))?;
        let vector = parse_vector(embedding)?;
        check_dims(&vector, self.dims)?;
        Ok(vector)
    }
}

/// Create the [`EmbeddingClient`] named by `config.provider`.
///
/// | Config Value | Client |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledEmbedder`] |
/// | `"openai"` | [`OpenAiEmbedder`] |
/// | `"ollama"` | [`OllamaEmbedder`] |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingClient>, EmbeddingError> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiEmbedder::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        _ => Ok(Arc::new(DisabledEmbedder)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(url: &str, dims: Option<usize>) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: "openai".to_string(),
            url: Some(url.to_string()),
            dims,
            max_retries: 2,
            ..EmbeddingConfig::default()
        }
    }

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_disabled_embedder_fails() {
        let err = DisabledEmbedder.embed("hello").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Disabled));
    }

    #[tokio::test]
    async fn test_openai_embed_parses_vector() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/embeddings")
            .match_header("authorization", "Bearer sk-test")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "text-embedding-3-small",
                "input": "lease terms"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":[{"index":0,"embedding":[0.25,-0.5,1.0]}]}"#)
            .create_async()
            .await;

        let embedder = OpenAiEmbedder::with_api_key(&config(&server.url(), Some(3)), "sk-test".into())
            .unwrap()
            .with_retry_policy(fast());
        let vector = embedder.embed("lease terms").await.unwrap();
        assert_eq!(vector, vec![0.25, -0.5, 1.0]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_openai_dims_mismatch_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/embeddings")
            .with_status(200)
            .with_body(r#"{"data":[{"embedding":[0.1,0.2]}]}"#)
            .create_async()
            .await;

        let embedder = OpenAiEmbedder::with_api_key(&config(&server.url(), Some(3)), "sk-test".into())
            .unwrap()
            .with_retry_policy(fast());
        let err = embedder.embed("x").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::InvalidResponse(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_openai_auth_failure_is_fatal() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/embeddings")
            .with_status(401)
            .with_body("invalid api key")
            .expect(1)
            .create_async()
            .await;

        let embedder = OpenAiEmbedder::with_api_key(&config(&server.url(), None), "sk-bad".into())
            .unwrap()
            .with_retry_policy(fast());
        let err = embedder.embed("x").await.unwrap_err();
        match &err {
            EmbeddingError::Provider { status, .. } => assert_eq!(*status, Some(401)),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!err.is_retryable());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_openai_server_error_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/embeddings")
            .with_status(500)
            .expect(3)
            .create_async()
            .await;

        let embedder = OpenAiEmbedder::with_api_key(&config(&server.url(), None), "sk-test".into())
            .unwrap()
            .with_retry_policy(fast());
        let err = embedder.embed("x").await.unwrap_err();
        assert!(err.is_retryable());
        mock.assert_async().await;
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let err = OpenAiEmbedder::with_api_key(&config("http://localhost", None), "  ".into())
            .err()
            .unwrap();
        assert!(matches!(err, EmbeddingError::MissingCredentials(_)));
    }

    #[tokio::test]
    async fn test_ollama_embed_parses_first_embedding() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/embed")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "nomic-embed-text"
            })))
            .with_status(200)
            .with_body(r#"{"embeddings":[[1.0,2.0]]}"#)
            .create_async()
            .await;

        let cfg = EmbeddingConfig {
            provider: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
            url: Some(server.url()),
            ..EmbeddingConfig::default()
        };
        let embedder = OllamaEmbedder::new(&cfg).unwrap().with_retry_policy(fast());
        assert_eq!(embedder.embed("x").await.unwrap(), vec![1.0, 2.0]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_ollama_missing_embeddings_is_invalid() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/embed")
            .with_status(200)
            .with_body(r#"{"embeddings":[]}"#)
            .create_async()
            .await;
        let cfg = EmbeddingConfig {
            provider: "ollama".to_string(),
            url: Some(server.url()),
            ..EmbeddingConfig::default()
        };
        let embedder = OllamaEmbedder::new(&cfg).unwrap().with_retry_policy(fast());
        assert!(matches!(
            embedder.embed("x").await,
            Err(EmbeddingError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_create_disabled_embedder() {
        let embedder = create_embedder(&EmbeddingConfig::default()).unwrap();
        assert_eq!(embedder.model_name(), "disabled");
    }
}
