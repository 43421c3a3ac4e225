//! Remote embedding provider client.
//!
//! Turns a canonical profile/job/skill description into a fixed-length
//! vector by calling a remote embedding model. Two failure classes are kept
//! apart on purpose:
//!
//! - **Model-specific failures** (the service rejects the requested model):
//!   the client moves to the next identifier in the ordered fallback list.
//! - **Transient failures** (network error, timeout, server error): the
//!   client retries the *same* model with exponential backoff and never
//!   falls through to the next model, because a flaky network says nothing
//!   about the model itself.
//!
//! Every attempt carries the configured timeout, so a stuck provider fails
//! rather than hangs. When the fallback list is exhausted the caller gets
//! [`EmbeddingError::ProviderUnavailable`] and nothing has been persisted.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during embedding generation.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("empty text provided for embedding")]
    EmptyText,

    #[error("invalid embedding response: {reason}")]
    InvalidResponse { reason: String },

    /// All fallback models were exhausted or timed out. The rebuild or
    /// query depending on this embed fails cleanly; no partial vector is
    /// ever upserted.
    #[error("embedding provider unavailable: {message}")]
    ProviderUnavailable { message: String },

    #[error("embedding client configuration error: {message}")]
    Config { message: String },
}

pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Configuration for the embedding client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub base_url: String,
    /// Model identifiers tried in order on model-specific failures.
    pub models: Vec<String>,
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Retries per model for transient failures.
    pub max_retries: usize,
    pub initial_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            models: vec![
                "nomic-embed-text".to_string(),
                "all-minilm".to_string(),
            ],
            timeout_ms: 30_000,
            max_retries: 3,
            initial_retry_delay_ms: 500,
            max_retry_delay_ms: 8_000,
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Outcome of one attempt against one model.
enum AttemptError {
    /// The service rejected this model; try the next one in the list.
    ModelRejected { status: StatusCode },
    /// Transient transport or server failure; retry the same model.
    Transient { message: String },
}

/// Why one model ultimately failed after its attempts.
enum ModelFailure {
    /// The service does not serve this model; the next one in the list may.
    Rejected { message: String },
    /// The retry budget ran out on transient failures. The network or the
    /// service is the problem, not the model identifier, so trying another
    /// model must not happen.
    TransientExhausted { message: String },
}

/// Async HTTP client for the embedding provider.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    config: EmbeddingConfig,
    client: Client,
}

impl EmbeddingClient {
    pub fn new(config: EmbeddingConfig) -> EmbeddingResult<Self> {
        if config.models.is_empty() {
            return Err(EmbeddingError::Config {
                message: "at least one model identifier is required".to_string(),
            });
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| EmbeddingError::Config {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    /// Embed a text description into a fixed-length vector.
    pub async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyText);
        }

        let mut last_rejection = String::new();
        for model in &self.config.models {
            match self.embed_with_model(model, text).await {
                Ok(values) => return Ok(values),
                Err(ModelFailure::Rejected { message }) => {
                    last_rejection = message;
                }
                // Only model rejections walk the fallback list; transient
                // exhaustion fails the whole call.
                Err(ModelFailure::TransientExhausted { message }) => {
                    return Err(EmbeddingError::ProviderUnavailable { message });
                }
            }
        }

        Err(EmbeddingError::ProviderUnavailable {
            message: format!(
                "all {} fallback models rejected, last failure: {last_rejection}",
                self.config.models.len()
            ),
        })
    }

    /// Embed with a single model, retrying transient failures with
    /// exponential backoff. A model rejection short-circuits the retry loop
    /// so the caller can move down the fallback list; transient exhaustion
    /// is reported as its own failure class so the caller stops instead.
    async fn embed_with_model(
        &self,
        model: &str,
        text: &str,
    ) -> Result<Vec<f32>, ModelFailure> {
        let mut delay_ms = self.config.initial_retry_delay_ms;
        let mut attempt = 0;

        loop {
            match self.attempt(model, text).await {
                Ok(values) => return Ok(values),
                Err(AttemptError::ModelRejected { status }) => {
                    log::warn!("embedding model {model} rejected by provider (HTTP {status}), trying next model");
                    return Err(ModelFailure::Rejected {
                        message: format!("model {model} rejected with HTTP {status}"),
                    });
                }
                Err(AttemptError::Transient { message }) => {
                    if attempt >= self.config.max_retries {
                        return Err(ModelFailure::TransientExhausted {
                            message: format!(
                                "model {model} failed after {attempt} retries: {message}"
                            ),
                        });
                    }
                    log::debug!(
                        "transient embedding failure for model {model} (attempt {}): {message}, retrying in {delay_ms}ms",
                        attempt + 1
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    delay_ms = (delay_ms * 2).min(self.config.max_retry_delay_ms);
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(&self, model: &str, text: &str) -> Result<Vec<f32>, AttemptError> {
        let url = format!(
            "{}/api/embeddings",
            self.config.base_url.trim_end_matches('/')
        );
        let payload = EmbeddingRequest {
            model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AttemptError::Transient {
                message: if e.is_timeout() {
                    format!("timeout after {}ms", self.config.timeout_ms)
                } else {
                    e.to_string()
                },
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::BAD_REQUEST {
            return Err(AttemptError::ModelRejected { status });
        }
        if !status.is_success() {
            return Err(AttemptError::Transient {
                message: format!("HTTP {status}"),
            });
        }

        let parsed = response
            .json::<EmbeddingResponse>()
            .await
            .map_err(|e| AttemptError::Transient {
                message: format!("response decode failed: {e}"),
            })?;

        Self::validate_embedding(parsed.embedding).map_err(|e| AttemptError::Transient {
            message: e.to_string(),
        })
    }

    fn validate_embedding(values: Vec<f32>) -> EmbeddingResult<Vec<f32>> {
        if values.is_empty() {
            return Err(EmbeddingError::InvalidResponse {
                reason: "empty embedding".to_string(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(EmbeddingError::InvalidResponse {
                reason: "embedding contains non-finite values".to_string(),
            });
        }
        Ok(values)
    }
}
