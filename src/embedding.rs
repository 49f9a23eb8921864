//! Embedding providers.
//!
//! - **[`DisabledEmbedder`]** returns errors; used when embeddings are not
//!   configured.
//! - **[`OpenAIEmbedder`]** calls `POST {base_url}/embeddings` once per text.
//!
//! Use [`create_embedder`] to pick one from the configuration:
//!
//! ```rust,no_run
//! # use evrag::config::EmbeddingConfig;
//! # use evrag::embedding::create_embedder;
//! # use evrag_core::embedding::Embedder;
//! let config = EmbeddingConfig::default(); // provider = "disabled"
//! let embedder = create_embedder(&config).unwrap();
//! assert_eq!(embedder.model_name(), "disabled");
//! ```

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use evrag_core::embedding::Embedder;

use crate::config::{resolve_base_url, EmbeddingConfig};
use crate::openai::OpenAIClient;

pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("Embedding provider is disabled")
    }
}

pub struct OpenAIEmbedder {
    client: OpenAIClient,
    model: String,
    dims: usize,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = OpenAIClient::new(
            resolve_base_url(config.base_url.as_deref()),
            config.timeout_secs,
            config.max_retries,
        )?;
        Ok(Self {
            client,
            model: config.model.clone(),
            dims: config.dims,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });
        let json = self.client.post_json("embeddings", &body).await?;
        parse_embedding_response(&json)
    }
}

/// Extract `data[0].embedding` from an embeddings API reply.
fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let embedding = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .and_then(|item| item.get("embedding"))
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid embeddings response: missing data[0].embedding"))?;

    embedding
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| anyhow!("Invalid embeddings response: non-numeric value"))
        })
        .collect()
}

/// Create the [`Embedder`] named by `config.provider`.
///
/// # Errors
///
/// Returns an error for unknown provider names or if the OpenAI provider
/// cannot be initialized (missing API key).
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}
