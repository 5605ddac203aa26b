//! Remote embedding generation via the Gemini embedContent API
//!
//! Produces fixed-length semantic embeddings for long-term memory indexing
//! and query-time search, with bounded retry on rate limiting.

use crate::embeddings::{EmbeddingFields, EmbeddingGenerator};
use crate::error::{EngramError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Embedding dimension for gemini-embedding-001
pub const GEMINI_EMBEDDING_DIM: usize = 1536;

/// Default model name
pub const DEFAULT_EMBEDDING_MODEL: &str = "gemini-embedding-001";

/// Default API base URL
pub const DEFAULT_EMBEDDING_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Maximum retry attempts for rate limiting
const MAX_RETRIES: usize = 3;

/// Backoff base duration in milliseconds
const BACKOFF_BASE_MS: u64 = 1000;

/// Request timeout duration
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Gemini embedding generator
pub struct GeminiEmbeddingGenerator {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest {
    content: Content,
    task_type: String,
    output_dimensionality: usize,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: Option<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

impl GeminiEmbeddingGenerator {
    /// Create a new generator
    ///
    /// # Arguments
    /// * `api_key` - Gemini API key
    /// * `model` - Model name (defaults to gemini-embedding-001)
    /// * `base_url` - API base URL (defaults to the Gemini endpoint)
    pub fn new(api_key: String, model: Option<String>, base_url: Option<String>) -> Result<Self> {
        if api_key.is_empty() {
            return Err(EngramError::Embedding(
                "API key cannot be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            base_url: base_url.unwrap_or_else(|| DEFAULT_EMBEDDING_BASE_URL.to_string()),
        })
    }

    async fn call_api(&self, contents: &[String], dim: usize) -> Result<Option<Vec<f32>>> {
        let url = format!("{}/models/{}:embedContent", self.base_url, self.model);
        let request = EmbedContentRequest {
            content: Content {
                parts: contents
                    .iter()
                    .map(|text| Part { text: text.clone() })
                    .collect(),
            },
            task_type: "RETRIEVAL_QUERY".to_string(),
            output_dimensionality: dim,
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body: EmbedContentResponse = response.json().await?;
                Ok(body.embedding.map(|embedding| embedding.values))
            }
            StatusCode::TOO_MANY_REQUESTS => Err(EngramError::Embedding(
                "rate limit exceeded".to_string(),
            )),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(EngramError::Embedding(format!(
                    "embedContent failed with {}: {}",
                    status, body
                )))
            }
        }
    }

    /// Call the API with bounded retry on rate limiting
    async fn call_api_with_retry(&self, contents: &[String], dim: usize) -> Result<Option<Vec<f32>>> {
        let mut retries = 0;

        loop {
            match self.call_api(contents, dim).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if retries >= MAX_RETRIES {
                        return Err(e);
                    }

                    let should_retry = match &e {
                        EngramError::Embedding(msg) => msg.contains("rate limit"),
                        EngramError::Http(err) => err.is_timeout(),
                        _ => false,
                    };
                    if !should_retry {
                        return Err(e);
                    }

                    let backoff = BACKOFF_BASE_MS * 2u64.pow(retries as u32);
                    warn!(retries, backoff_ms = backoff, "retrying embedContent");
                    sleep(Duration::from_millis(backoff)).await;
                    retries += 1;
                }
            }
        }
    }
}

#[async_trait]
impl EmbeddingGenerator for GeminiEmbeddingGenerator {
    async fn embed(&self, dim: usize, fields: &EmbeddingFields) -> Result<Option<Vec<f32>>> {
        let contents = fields.to_contents();
        if contents.is_empty() {
            return Ok(None);
        }

        debug!(parts = contents.len(), dim, "requesting embedding");
        self.call_api_with_retry(&contents, dim).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_api_key_rejected() {
        let result = GeminiEmbeddingGenerator::new(String::new(), None, None);
        assert!(matches!(result, Err(EngramError::Embedding(_))));
    }

    #[test]
    fn test_defaults() {
        let generator =
            GeminiEmbeddingGenerator::new("test-key".to_string(), None, None).unwrap();
        assert_eq!(generator.model, DEFAULT_EMBEDDING_MODEL);
        assert_eq!(generator.base_url, DEFAULT_EMBEDDING_BASE_URL);
    }

    #[tokio::test]
    async fn test_embed_with_no_fields_is_none() {
        let generator =
            GeminiEmbeddingGenerator::new("test-key".to_string(), None, None).unwrap();
        let result = generator
            .embed(GEMINI_EMBEDDING_DIM, &EmbeddingFields::default())
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
