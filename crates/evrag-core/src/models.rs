//! Data types that flow through the ingestion and query pipelines.
//!
//! [`Event`] is owned by the external event store and is read-only here.
//! Everything else is derived from events ([`Chunk`], [`IndexedVector`]) or
//! created per query ([`Candidate`], [`ReducedCandidate`], [`ResolvedEvent`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of an event in the event store.
pub type EventId = i64;

/// An event record as supplied by the event store or an ingestion request.
///
/// Field aliases accept the column names used by the hosted event table
/// (`long_description`, `start_datetime`, `end_datetime`, `website_url`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "long_description")]
    pub description: String,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, alias = "start_datetime")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, alias = "end_datetime")]
    pub end: Option<DateTime<Utc>>,
    #[serde(default, alias = "website_url")]
    pub website: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// A bounded text segment of one event, the unit of embedding.
///
/// Carries the display fields of its event so a search hit can be rendered
/// without a second lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub event_id: EventId,
    pub chunk_index: usize,
    pub text: String,
    pub event_name: String,
    pub area: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub website: Option<String>,
}

/// A chunk together with its embedding, as stored in the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedVector {
    /// Row identity assigned by the index, if it has persisted the vector.
    pub id: Option<i64>,
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// One nearest-neighbor hit from a single retrieval call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    #[serde(flatten)]
    pub chunk: Chunk,
    /// Provider-defined similarity. `None` when the index returned no
    /// usable score for the hit.
    pub similarity: Option<f64>,
}

/// The best-scoring candidate of one event after threshold filtering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReducedCandidate {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub similarity: f64,
}

impl ReducedCandidate {
    pub fn event_id(&self) -> EventId {
        self.chunk.event_id
    }
}

impl From<ReducedCandidate> for Candidate {
    fn from(rc: ReducedCandidate) -> Self {
        Candidate {
            chunk: rc.chunk,
            similarity: Some(rc.similarity),
        }
    }
}

/// Speaker of a [`ConversationTurn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A role-tagged message in the caller-supplied dialogue history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A full event record suggested alongside an answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedEvent {
    #[serde(flatten)]
    pub event: Event,
    pub similarity: f64,
}

/// Terminal output of the query pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<ReducedCandidate>,
    pub events: Vec<ResolvedEvent>,
}
