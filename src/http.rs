//! JSON-over-HTTP calls with bounded retry, shared by the embedding and
//! generation clients.
//!
//! Retry strategy:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors and timeouts → retry
//! - Backoff: `base_delay × 2^(attempt-1)`, exponent capped at 5

use std::time::Duration;

use tracing::warn;

/// Retry settings for one client.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_secs(1),
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * (1u32 << (attempt - 1).min(5))
    }
}

/// Why a call failed after retries were exhausted or skipped.
#[derive(Debug)]
pub enum CallFailure {
    Timeout,
    Status {
        status: u16,
        body: String,
        retryable: bool,
    },
    Network(String),
    Decode(String),
}

/// Build a client with a per-request timeout.
pub fn build_client(timeout_secs: u64) -> Result<reqwest::Client, String> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| e.to_string())
}

/// POST `body` to `url` and decode the JSON response, retrying transient failures.
pub async fn post_json(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
    policy: RetryPolicy,
) -> Result<serde_json::Value, CallFailure> {
    let mut last_err = CallFailure::Network("no attempt made".to_string());

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            tokio::time::sleep(policy.delay(attempt)).await;
        }

        let mut request = client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(key) = bearer {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json::<serde_json::Value>()
                        .await
                        .map_err(|e| CallFailure::Decode(e.to_string()));
                }

                let body_text = response.text().await.unwrap_or_default();
                let retryable = status.as_u16() == 429 || status.is_server_error();
                last_err = CallFailure::Status {
                    status: status.as_u16(),
                    body: body_text,
                    retryable,
                };
                if !retryable {
                    return Err(last_err);
                }
                warn!(url, status = status.as_u16(), attempt, "transient HTTP error");
            }
            Err(e) if e.is_timeout() => {
                warn!(url, attempt, "request timed out");
                last_err = CallFailure::Timeout;
            }
            Err(e) => {
                warn!(url, attempt, error = %e, "request failed");
                last_err = CallFailure::Network(e.to_string());
            }
        }
    }

    Err(last_err)
}
