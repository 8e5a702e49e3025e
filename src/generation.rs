//! Generation client implementations.
//!
//! [`OpenAiGenerator`] sends the rendered prompt as a single user message to
//! `POST {url}/chat/completions`. [`DisabledGenerator`] fails every call,
//! which still allows context-only retrieval.

use std::sync::Arc;

use async_trait::async_trait;
use lexrag_core::error::GenerationError;
use lexrag_core::generation::GenerationClient;

use crate::config::GenerationConfig;
use crate::embedding::OPENAI_DEFAULT_URL;
use crate::http::{build_client, post_json, CallFailure, RetryPolicy};

fn classify(failure: CallFailure, timeout_secs: u64) -> GenerationError {
    match failure {
        CallFailure::Timeout => GenerationError::Timeout(timeout_secs),
        CallFailure::Status {
            status,
            body,
            retryable,
        } => GenerationError::Provider {
            status: Some(status),
            message: body,
            retryable,
        },
        CallFailure::Network(message) => GenerationError::Provider {
            status: None,
            message,
            retryable: true,
        },
        CallFailure::Decode(message) => GenerationError::InvalidResponse(message),
    }
}

pub struct DisabledGenerator;

#[async_trait]
impl GenerationClient for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn complete(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::Disabled)
    }
}

/// Chat-completions generator.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
    timeout_secs: u64,
    retry: RetryPolicy,
}

impl OpenAiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            GenerationError::MissingCredentials("OPENAI_API_KEY environment variable not set".into())
        })?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &GenerationConfig, api_key: String) -> Result<Self, GenerationError> {
        if api_key.trim().is_empty() {
            return Err(GenerationError::MissingCredentials(
                "OpenAI API key is empty".into(),
            ));
        }
        let client = build_client(config.timeout_secs).map_err(GenerationError::InvalidResponse)?;
        Ok(Self {
            client,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_DEFAULT_URL.to_string()),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
            // Generation is not retried on transient errors; callers decide.
            retry: RetryPolicy::new(0),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl GenerationClient for OpenAiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
        });
        let url = format!("{}/chat/completions", self.url.trim_end_matches('/'));
        let json = post_json(&self.client, &url, Some(&self.api_key), &body, self.retry)
            .await
            .map_err(|f| classify(f, self.timeout_secs))?;

        json.get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                GenerationError::InvalidResponse("missing choices[0].message.content".to_string())
            })
    }
}

/// Create the [`GenerationClient`] named by `config.provider`.
pub fn create_generator(
    config: &GenerationConfig,
) -> Result<Arc<dyn GenerationClient>, GenerationError> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiGenerator::new(config)?)),
        _ => Ok(Arc::new(DisabledGenerator)),
    }
}
