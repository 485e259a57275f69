//! Embedding provider implementations.
//!
//! - **[`DisabledEmbedder`]**: returns [`CoreError::NotConfigured`]; used when
//!   `embedding.provider = "disabled"`.
//! - **[`OpenAiEmbedder`]**: calls the OpenAI embeddings API
//!   (`POST {url}/embeddings`). Requires `OPENAI_API_KEY`.
//! - **[`OllamaEmbedder`]**: calls a local Ollama instance's `/api/embed`
//!   endpoint.
//!
//! All HTTP backends share the retry policy in [`crate::http`]. Providers
//! embed one text per request; the index builder drives them sequentially.

use async_trait::async_trait;
use bugreport_harness_core::embedding::EmbeddingProvider;
use bugreport_harness_core::{CoreError, Result};
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingConfig;
use crate::http::{env_api_key, join_url, JsonClient};

pub const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1";
pub const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

// ============ Disabled Provider ============

/// Embedding provider that always fails with
/// [`CoreError::NotConfigured`].
pub struct DisabledEmbedder;

#[async_trait]
impl EmbeddingProvider for DisabledEmbedder {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn embed(&self, _text: &str, _model: &str) -> Result<Vec<f64>> {
        Err(CoreError::NotConfigured {
            provider: "embedding".to_string(),
        })
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API (or any endpoint speaking the
/// same protocol).
pub struct OpenAiEmbedder {
    http: JsonClient,
    url: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct OpenAiEmbedRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    embedding: Vec<f64>,
}

impl OpenAiEmbedder {
    pub fn new(http: JsonClient, url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            url: url.into(),
            api_key,
        }
    }

    /// Build from configuration, reading `OPENAI_API_KEY` from the
    /// environment. A missing key is reported on the first request.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let http = JsonClient::new("OpenAI", config.timeout_secs, config.max_retries)?;
        let url = config.url.as_deref().unwrap_or(OPENAI_DEFAULT_URL);
        Ok(Self::new(http, url, env_api_key("OPENAI_API_KEY")))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn name(&self) -> &str {
        "openai"
    }

    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f64>> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            CoreError::AuthenticationMissing("OPENAI_API_KEY environment variable not set".into())
        })?;

        let body = OpenAiEmbedRequest {
            model,
            input: [text],
        };
        let headers = [("Authorization", format!("Bearer {}", api_key))];
        let response: OpenAiEmbedResponse = self
            .http
            .post_json(&join_url(&self.url, "embeddings"), &headers, &body)
            .await?;

        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| {
                CoreError::MalformedResponse("OpenAI response: empty data array".into())
            })
    }
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Requires Ollama to be running with an embedding model pulled
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaEmbedder {
    http: JsonClient,
    url: String,
}

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f64>>,
}

impl OllamaEmbedder {
    pub fn new(http: JsonClient, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let http = JsonClient::new("Ollama", config.timeout_secs, config.max_retries)?;
        let url = config.url.as_deref().unwrap_or(OLLAMA_DEFAULT_URL);
        Ok(Self::new(http, url))
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f64>> {
        let body = OllamaEmbedRequest { model, input: text };
        let response: OllamaEmbedResponse = self
            .http
            .post_json(&join_url(&self.url, "api/embed"), &[], &body)
            .await?;

        response.embeddings.into_iter().next().ok_or_else(|| {
            CoreError::MalformedResponse("Ollama response: empty embeddings array".into())
        })
    }
}
