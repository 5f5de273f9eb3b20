//! Ollama embedding backend implementation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use lattice_core::{Error, Result, TokenUsage};

use crate::provider::EmbeddingBackend;

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = lattice_core::defaults::OLLAMA_URL;

/// Default embedding model.
pub const DEFAULT_EMBED_MODEL: &str = lattice_core::defaults::EMBED_MODEL;

/// Default embedding dimension for nomic-embed-text.
pub const DEFAULT_DIMENSION: usize = lattice_core::defaults::EMBED_DIMENSION;

/// Timeout for embedding requests (seconds).
pub const EMBED_TIMEOUT_SECS: u64 = lattice_core::defaults::EMBED_TIMEOUT_SECS;

/// Ollama embedding backend.
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    embed_model: String,
    dimension: usize,
    embed_timeout_secs: u64,
}

impl OllamaBackend {
    /// Create a new Ollama backend with default settings.
    pub fn new() -> Self {
        Self::with_config(
            DEFAULT_OLLAMA_URL.to_string(),
            DEFAULT_EMBED_MODEL.to_string(),
            DEFAULT_DIMENSION,
        )
    }

    /// Create a new Ollama backend with custom configuration.
    pub fn with_config(base_url: String, embed_model: String, dimension: usize) -> Self {
        let embed_timeout_secs = std::env::var("LATTICE_EMBED_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(EMBED_TIMEOUT_SECS);

        info!(
            "Initializing Ollama backend: url={}, embed={}",
            base_url, embed_model
        );

        Self {
            client: Client::new(),
            base_url,
            embed_model,
            dimension,
            embed_timeout_secs,
        }
    }

    /// Create a backend from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `LATTICE_OLLAMA_URL` | `http://localhost:11434` | Ollama endpoint |
    /// | `LATTICE_EMBED_MODEL` | `nomic-embed-text` | Embedding model |
    /// | `LATTICE_EMBED_TIMEOUT_SECS` | `120` | Per-request timeout |
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("LATTICE_OLLAMA_URL").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());
        let embed_model =
            std::env::var("LATTICE_EMBED_MODEL").unwrap_or_else(|_| DEFAULT_EMBED_MODEL.to_string());
        Self::with_config(base_url, embed_model, DEFAULT_DIMENSION)
    }
}

impl Default for OllamaBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embeddings: Vec<Vec<f32>>,
    /// Tokens consumed by the prompt, when the server reports them.
    #[serde(default)]
    prompt_eval_count: Option<u64>,
}

#[async_trait]
impl EmbeddingBackend for OllamaBackend {
    #[instrument(skip(self, texts), fields(subsystem = "inference", component = "ollama", op = "embed_texts", model = %self.embed_model, input_count = texts.len()))]
    async fn embed_texts(&self, texts: &[String]) -> Result<(Vec<Vec<f32>>, TokenUsage)> {
        if texts.is_empty() {
            return Ok((vec![], TokenUsage::zero()));
        }

        let start = Instant::now();

        let request = EmbeddingRequest {
            model: self.embed_model.clone(),
            input: texts.to_vec(),
        };

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .timeout(Duration::from_secs(self.embed_timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to parse response: {}", e)))?;

        let prompt_tokens = result.prompt_eval_count.unwrap_or(0);
        let usage = TokenUsage::new(prompt_tokens, prompt_tokens);
        let elapsed = start.elapsed().as_millis() as u64;

        debug!(
            result_count = result.embeddings.len(),
            total_tokens = usage.total_tokens,
            duration_ms = elapsed,
            "Embedding complete"
        );
        if elapsed > 5000 {
            warn!(
                duration_ms = elapsed,
                input_count = texts.len(),
                slow = true,
                "Slow embedding operation"
            );
        }
        Ok((result.embeddings, usage))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.embed_model
    }
}
