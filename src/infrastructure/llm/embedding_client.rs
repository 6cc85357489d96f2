//! HTTP embedding provider.
//!
//! Uses the OpenAI-compatible `POST {base_url}/embeddings` endpoint:
//! request `{ "model": "...", "input": ["text", ...] }`, response
//! `{ "data": [{ "embedding": [0.1, ...], "index": 0 }, ...] }`.
//! Results are re-ordered by `index` so they line up with the input.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::http::JsonClient;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::LlmConfig;
use crate::domain::ports::EmbeddingProvider;

/// Maximum texts per single API request.
const MAX_BATCH_SIZE: usize = 256;

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Embedding provider backed by an OpenAI-compatible HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpEmbeddingProvider {
    client: JsonClient,
    model: String,
}

impl HttpEmbeddingProvider {
    /// Build from the `llm` config section, using `embedding_model`.
    pub fn new(config: &LlmConfig) -> DomainResult<Self> {
        Ok(Self {
            client: JsonClient::from_config(config)?,
            model: config.embedding_model.clone(),
        })
    }

    async fn call_embeddings_api(&self, texts: &[String]) -> DomainResult<Vec<Vec<f32>>> {
        let request = EmbeddingsRequest {
            model: &self.model,
            input: texts,
        };
        let response: EmbeddingsResponse = self
            .client
            .post("embeddings", &request)
            .await
            .map_err(|e| DomainError::EmbeddingFailed(e.to_string()))?;

        if response.data.len() != texts.len() {
            return Err(DomainError::EmbeddingFailed(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                response.data.len()
            )));
        }

        // Sort by index to maintain input order
        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn embed(&self, text: &str) -> DomainResult<Vec<f32>> {
        self.call_embeddings_api(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::EmbeddingFailed("Empty embedding response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> DomainResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(MAX_BATCH_SIZE) {
            vectors.extend(self.call_embeddings_api(chunk).await?);
        }
        Ok(vectors)
    }
}
