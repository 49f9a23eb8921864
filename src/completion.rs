//! Completion providers backed by the chat completions API.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use evrag_core::completion::CompletionProvider;
use evrag_core::models::ConversationTurn;

use crate::config::{resolve_base_url, CompletionConfig};
use crate::openai::OpenAIClient;

pub struct DisabledCompletion;

#[async_trait]
impl CompletionProvider for DisabledCompletion {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _messages: &[ConversationTurn]) -> Result<String> {
        bail!("Completion provider is disabled")
    }
}

/// Calls `POST {base_url}/chat/completions` with a fixed temperature.
pub struct OpenAICompletion {
    client: OpenAIClient,
    model: String,
    temperature: f32,
}

impl OpenAICompletion {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let client = OpenAIClient::new(
            resolve_base_url(config.base_url.as_deref()),
            config.timeout_secs,
            config.max_retries,
        )?;
        Ok(Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAICompletion {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ConversationTurn]) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        });
        let json = self.client.post_json("chat/completions", &body).await?;
        parse_completion_response(&json)
    }
}

/// Extract `choices[0].message.content`. An empty answer is an error.
fn parse_completion_response(json: &serde_json::Value) -> Result<String> {
    let content = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| anyhow!("Invalid completion response: missing choices[0].message.content"))?;

    if content.trim().is_empty() {
        bail!("Completion response was empty");
    }
    Ok(content.to_string())
}

pub fn create_completion(config: &CompletionConfig) -> Result<Arc<dyn CompletionProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledCompletion)),
        "openai" => Ok(Arc::new(OpenAICompletion::new(config)?)),
        other => bail!("Unknown completion provider: {}", other),
    }
}
