//! Grounded answer composition.
//!
//! Builds a grounding context out of retrieved chunks, wraps it in a fixed
//! system instruction, and asks a [`CompletionProvider`] for the answer.
//!
//! # Context format
//!
//! Each candidate becomes one block; blocks are joined by
//! [`BLOCK_DELIMITER`]:
//!
//! ```text
//! Title: Fall Festival
//! When: 2025-10-01 10:00 UTC – 2025-10-01 17:00 UTC
//! Where: Downtown
//! Link: https://example.com/fall
//! Details: Fall Festival
//! Outdoor festival downtown
//! ```
//!
//! Blocks are appended while the context stays within `max_context_chars`;
//! the first block is always kept. An empty context switches the system
//! instruction to the "nothing found" template instead of letting the model
//! improvise.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::completion::CompletionProvider;
use crate::error::RagError;
use crate::models::{Candidate, ConversationTurn};

/// Separator placed between context blocks.
pub const BLOCK_DELIMITER: &str = "\n\n---\n\n";

/// Tuning for the system instruction and context size.
#[derive(Debug, Clone)]
pub struct ComposeOptions {
    /// Upper bound on events the model may suggest.
    pub max_suggestions: usize,
    /// Natural language the answer must be written in.
    pub language: String,
    /// Character budget for the grounding context.
    pub max_context_chars: usize,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            max_suggestions: 3,
            language: "Japanese".to_string(),
            max_context_chars: 12_000,
        }
    }
}

/// Render one candidate as a context block.
pub fn context_block(candidate: &Candidate) -> String {
    let chunk = &candidate.chunk;
    let title = if chunk.event_name.trim().is_empty() {
        "(untitled)"
    } else {
        chunk.event_name.as_str()
    };
    let mut block = format!(
        "Title: {}\nWhen: {} – {}\nWhere: {}\n",
        title,
        format_when(chunk.start),
        format_when(chunk.end),
        chunk.area.as_deref().unwrap_or("unknown"),
    );
    if let Some(url) = &chunk.website {
        block.push_str(&format!("Link: {}\n", url));
    }
    block.push_str(&format!("Details: {}", chunk.text));
    block
}

fn format_when(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "TBD".to_string())
}

/// Join candidate blocks into one context string within `max_chars`
/// characters (not bytes).
pub fn build_context(candidates: &[Candidate], max_chars: usize) -> String {
    let delimiter_chars = BLOCK_DELIMITER.chars().count();
    let mut context = String::new();
    let mut used = 0usize;
    for (i, candidate) in candidates.iter().enumerate() {
        let block = context_block(candidate);
        let block_chars = block.chars().count();
        let extra = if context.is_empty() {
            block_chars
        } else {
            delimiter_chars + block_chars
        };
        if i > 0 && used + extra > max_chars {
            debug!(
                kept = i,
                dropped = candidates.len() - i,
                "context budget reached"
            );
            break;
        }
        if !context.is_empty() {
            context.push_str(BLOCK_DELIMITER);
        }
        context.push_str(&block);
        used += extra;
    }
    context
}

/// System instruction for a non-empty grounding context.
pub fn grounded_instruction(context: &str, opts: &ComposeOptions) -> String {
    format!(
        "You are an event recommendation assistant. Suggest at most {max} events that \
         match the user's conditions, answering concisely in {lang}. Answer only from the \
         context below and never invent events, dates, places, prices, or links that it \
         does not contain. Present each suggestion as a short bulleted list with its date, \
         place, and cost when known, and finish with any related links.\n\n\
         [Context]\n{context}",
        max = opts.max_suggestions,
        lang = opts.language,
        context = context,
    )
}

/// System instruction used when no candidate passed the filters.
pub fn nothing_found_instruction(opts: &ComposeOptions) -> String {
    format!(
        "You are an event recommendation assistant. No events in the catalogue matched \
         the user's request. Tell the user, in {lang}, that no matching events were found \
         and suggest broadening or rephrasing the conditions. Do not suggest, describe, or \
         invent any specific event.",
        lang = opts.language,
    )
}

/// The full message list sent to the completion model: system instruction,
/// then `history`, then the current query as a user turn.
pub fn build_messages(
    query: &str,
    history: &[ConversationTurn],
    candidates: &[Candidate],
    opts: &ComposeOptions,
) -> Vec<ConversationTurn> {
    let context = build_context(candidates, opts.max_context_chars);
    let system = if context.is_empty() {
        nothing_found_instruction(opts)
    } else {
        grounded_instruction(&context, opts)
    };

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ConversationTurn::system(system));
    messages.extend(history.iter().cloned());
    messages.push(ConversationTurn::user(query));
    messages
}

/// Composes answers through a shared completion provider.
#[derive(Clone)]
pub struct AnswerComposer {
    provider: Arc<dyn CompletionProvider>,
    options: ComposeOptions,
}

impl AnswerComposer {
    pub fn new(provider: Arc<dyn CompletionProvider>, options: ComposeOptions) -> Self {
        Self { provider, options }
    }

    pub fn options(&self) -> &ComposeOptions {
        &self.options
    }

    /// Ask the model to answer `query` from `candidates`.
    pub async fn compose(
        &self,
        query: &str,
        history: &[ConversationTurn],
        candidates: &[Candidate],
    ) -> Result<String, RagError> {
        let messages = build_messages(query, history, candidates, &self.options);
        debug!(
            model = self.provider.model_name(),
            messages = messages.len(),
            candidates = candidates.len(),
            "requesting completion"
        );
        self.provider
            .complete(&messages)
            .await
            .map_err(RagError::Provider)
    }
}
