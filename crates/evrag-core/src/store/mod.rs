//! Storage abstractions consumed by the pipeline.
//!
//! Two collaborators sit behind traits so backends can be swapped
//! (SQLite in the app crate, [`memory::InMemoryStore`] for tests):
//!
//! | Trait | Used by | Purpose |
//! |-------|---------|---------|
//! | [`EventStore`] | indexer input, pipeline resolution | Read event records |
//! | [`VectorIndex`] | indexer (write), retriever (read) | Embedded chunks + nearest-neighbor search |
//!
//! Implementations must be `Send + Sync` to be shared across concurrent
//! queries.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chunk, Event, EventId, IndexedVector};

/// One raw hit from [`VectorIndex::search`].
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub chunk: Chunk,
    /// Backend similarity (cosine for the bundled stores). Backends that
    /// cannot score a row return `None`.
    pub score: Option<f64>,
}

/// Source of event records.
///
/// Only `upsert_events` writes; it backs the `import` command and is not
/// used by indexing or querying.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert or replace events by id. Returns the number written.
    async fn upsert_events(&self, events: &[Event]) -> Result<usize>;

    /// Every event in the store, ordered by id.
    async fn all_events(&self) -> Result<Vec<Event>>;

    /// Batched lookup. Unknown ids are silently absent from the result;
    /// order is unspecified.
    async fn events_by_ids(&self, ids: &[EventId]) -> Result<Vec<Event>>;

    async fn count_events(&self) -> Result<usize>;
}

/// Vector index holding the embedded chunks of the last reindex.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Delete every stored vector and insert `items`, as one unit.
    ///
    /// Concurrent readers observe either the previous contents or the new
    /// ones, never a mix. Returns the number of vectors stored.
    async fn replace_all(&self, items: &[IndexedVector]) -> Result<usize>;

    /// The `limit` nearest neighbors of `query_vec`, best first.
    async fn search(&self, query_vec: &[f32], limit: usize) -> Result<Vec<IndexHit>>;

    async fn count(&self) -> Result<usize>;
}
