//! Completion provider trait.
//!
//! A completion provider takes an ordered list of role-tagged messages and
//! returns one text completion. Streaming is not used.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::ConversationTurn;

/// A chat-style large language model.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str;

    /// Run one completion over `messages`, in order.
    async fn complete(&self, messages: &[ConversationTurn]) -> Result<String>;
}
