//! Shared JSON-over-HTTP client for the LLM adapters.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::LlmConfig;

/// Environment variable consulted when `llm.api_key` is not configured.
pub const API_KEY_ENV: &str = "DOCVAL_LLM_API_KEY";

#[derive(Debug, Error)]
pub(crate) enum RequestError {
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("service returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("failed to parse response: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Thin reqwest wrapper posting JSON to paths under a base URL.
#[derive(Debug, Clone)]
pub(crate) struct JsonClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl JsonClient {
    pub(crate) fn from_config(config: &LlmConfig) -> DomainResult<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| DomainError::InvalidConfig("llm.base_url is not set".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DomainError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty());

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    pub(crate) async fn post<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, RequestError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut request = self.client.post(&url).json(body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(RequestError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".to_string());
            return Err(RequestError::Status { status, body });
        }

        response.json().await.map_err(RequestError::Decode)
    }
}
