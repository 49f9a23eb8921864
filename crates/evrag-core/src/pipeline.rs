//! Query pipeline orchestration.
//!
//! One [`QueryPipeline::run`] call walks the stages
//! `Idle → Embedding → Retrieving → Reducing → Composing → Resolving → Done`
//! strictly in order. A failure in any stage ends the run with a single
//! [`RagError`] tagged with that stage; nothing partial is returned.
//!
//! The pipeline keeps no per-request state and never writes, so any number
//! of runs may proceed concurrently and a dropped run has no side effects.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use serde::Deserialize;
use tracing::{debug, info};

use crate::compose::AnswerComposer;
use crate::embedding::Embedder;
use crate::error::{PipelineStage, RagError};
use crate::models::{
    Candidate, ConversationTurn, EventId, QueryResponse, ReducedCandidate, ResolvedEvent, Role,
};
use crate::reduce::{filter_by_similarity, reduce, DEFAULT_MIN_SIMILARITY};
use crate::retrieve::Retriever;
use crate::store::EventStore;

/// Retrieval and reduction settings for the query path.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Result count used when the request does not specify one.
    pub top_k: usize,
    /// Largest result count a request may ask for.
    pub max_top_k: usize,
    /// Minimum neighbors to fetch from the index. The index is asked for
    /// `max(k, candidate_k)` so deduplication can still fill `k` events.
    pub candidate_k: usize,
    pub min_similarity: f64,
    /// Also deduplicate the composer context per event.
    pub dedup_context: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_top_k: 50,
            candidate_k: 0,
            min_similarity: DEFAULT_MIN_SIMILARITY,
            dedup_context: false,
        }
    }
}

/// A query: the caller's conversation plus an optional result count.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub messages: Vec<ConversationTurn>,
    #[serde(default, rename = "topK", alias = "top_k")]
    pub top_k: Option<usize>,
}

impl QueryRequest {
    /// A single-turn request.
    pub fn question(text: impl Into<String>) -> Self {
        Self {
            messages: vec![ConversationTurn::user(text)],
            top_k: None,
        }
    }
}

/// Split `messages` into the current query (the last user turn) and the
/// history: every other turn, in its original order. Turns that follow the
/// query are kept.
pub fn split_query(
    messages: &[ConversationTurn],
) -> Result<(&str, Vec<ConversationTurn>), RagError> {
    if messages.is_empty() {
        return Err(RagError::InvalidInput(
            "messages must not be empty".to_string(),
        ));
    }
    let pos = messages
        .iter()
        .rposition(|m| m.role == Role::User)
        .ok_or_else(|| RagError::InvalidInput("no user message found".to_string()))?;
    let query = messages[pos].content.trim();
    if query.is_empty() {
        return Err(RagError::InvalidInput(
            "query must not be empty".to_string(),
        ));
    }
    let history = messages[..pos]
        .iter()
        .chain(&messages[pos + 1..])
        .cloned()
        .collect();
    Ok((query, history))
}

/// The end-to-end question answering pipeline.
#[derive(Clone)]
pub struct QueryPipeline {
    embedder: Arc<dyn Embedder>,
    retriever: Retriever,
    composer: AnswerComposer,
    events: Arc<dyn EventStore>,
    options: QueryOptions,
}

impl QueryPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        retriever: Retriever,
        composer: AnswerComposer,
        events: Arc<dyn EventStore>,
        options: QueryOptions,
    ) -> Self {
        Self {
            embedder,
            retriever,
            composer,
            events,
            options,
        }
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Resolve the requested result count against the configured bounds.
    fn result_count(&self, requested: Option<usize>) -> Result<usize, RagError> {
        let k = requested.unwrap_or(self.options.top_k);
        if k == 0 || k > self.options.max_top_k {
            return Err(RagError::InvalidInput(format!(
                "topK must be between 1 and {}",
                self.options.max_top_k
            )));
        }
        Ok(k)
    }

    /// Answer one request.
    pub async fn run(&self, request: &QueryRequest) -> Result<QueryResponse, RagError> {
        let mut stage = PipelineStage::Idle;
        let (query, history) =
            split_query(&request.messages).map_err(|e| e.at(stage))?;
        let k = self.result_count(request.top_k).map_err(|e| e.at(stage))?;

        stage = PipelineStage::Embedding;
        debug!(%stage, k, "query accepted");
        let query_vec = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| RagError::Provider(e).at(stage))?;
        let dims = self.embedder.dims();
        if dims != 0 && query_vec.len() != dims {
            return Err(RagError::Provider(anyhow!(
                "query embedding has {} dimensions, expected {}",
                query_vec.len(),
                dims
            ))
            .at(stage));
        }

        stage = PipelineStage::Retrieving;
        debug!(%stage, dims = query_vec.len());
        let fetch = k.max(self.options.candidate_k);
        let candidates = self
            .retriever
            .search(&query_vec, fetch)
            .await
            .map_err(|e| e.at(stage))?;

        stage = PipelineStage::Reducing;
        debug!(%stage, candidates = candidates.len());
        let sources = reduce(&candidates, self.options.min_similarity, k);
        let context = self.context_candidates(&candidates);

        stage = PipelineStage::Composing;
        debug!(%stage, sources = sources.len(), context = context.len());
        let answer = self
            .composer
            .compose(query, &history, &context)
            .await
            .map_err(|e| e.at(stage))?;

        stage = PipelineStage::Resolving;
        debug!(%stage);
        let events = self
            .resolve(&sources)
            .await
            .map_err(|e| e.at(stage))?;

        stage = PipelineStage::Done;
        info!(
            %stage,
            sources = sources.len(),
            events = events.len(),
            "query answered"
        );
        Ok(QueryResponse {
            answer,
            sources,
            events,
        })
    }

    /// Candidates handed to the composer: threshold-filtered, and
    /// deduplicated per event only when configured.
    fn context_candidates(&self, candidates: &[Candidate]) -> Vec<Candidate> {
        if self.options.dedup_context {
            reduce(candidates, self.options.min_similarity, candidates.len())
                .into_iter()
                .map(Candidate::from)
                .collect()
        } else {
            filter_by_similarity(candidates, self.options.min_similarity)
        }
    }

    /// One batched event lookup for the reduced ids, scored and sorted.
    async fn resolve(&self, sources: &[ReducedCandidate]) -> Result<Vec<ResolvedEvent>, RagError> {
        if sources.is_empty() {
            return Ok(Vec::new());
        }

        let scores: HashMap<EventId, f64> = sources
            .iter()
            .map(|s| (s.event_id(), s.similarity))
            .collect();
        let ids: Vec<EventId> = sources.iter().map(|s| s.event_id()).collect();

        let found = self
            .events
            .events_by_ids(&ids)
            .await
            .map_err(RagError::Store)?;
        if found.len() < ids.len() {
            debug!(
                requested = ids.len(),
                found = found.len(),
                "some indexed events are missing from the event store"
            );
        }

        let mut resolved: Vec<ResolvedEvent> = found
            .into_iter()
            .filter_map(|event| {
                scores.get(&event.id).map(|&similarity| ResolvedEvent {
                    event,
                    similarity,
                })
            })
            .collect();
        resolved.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
                .then(a.event.id.cmp(&b.event.id))
        });
        Ok(resolved)
    }
}
