//! In-memory [`EventStore`] and [`VectorIndex`] for tests and embedding
//! the pipeline without a database.
//!
//! State lives behind `std::sync::RwLock`s. Vector search is brute-force
//! cosine similarity over all stored vectors. `replace_all` swaps the whole
//! vector list under one write lock, so searches never see a partial index.

use std::collections::{BTreeMap, HashSet};
use std::sync::{PoisonError, RwLock};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{Event, EventId, IndexedVector};

use super::{EventStore, IndexHit, VectorIndex};

/// In-memory store implementing both storage traits.
pub struct InMemoryStore {
    events: RwLock<BTreeMap<EventId, Event>>,
    vectors: RwLock<Vec<IndexedVector>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(BTreeMap::new()),
            vectors: RwLock::new(Vec::new()),
        }
    }

    /// Store pre-populated with `events`.
    pub fn with_events(events: impl IntoIterator<Item = Event>) -> Self {
        let store = Self::new();
        if let Ok(mut map) = store.events.write() {
            map.extend(events.into_iter().map(|ev| (ev.id, ev)));
        }
        store
    }

    /// Snapshot of the stored vectors, in insertion order.
    pub fn vectors(&self) -> Result<Vec<IndexedVector>> {
        Ok(self.vectors.read().map_err(poisoned)?.clone())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: PoisonError<T>) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl EventStore for InMemoryStore {
    async fn upsert_events(&self, events: &[Event]) -> Result<usize> {
        let mut map = self.events.write().map_err(poisoned)?;
        for ev in events {
            map.insert(ev.id, ev.clone());
        }
        Ok(events.len())
    }

    async fn all_events(&self) -> Result<Vec<Event>> {
        let map = self.events.read().map_err(poisoned)?;
        Ok(map.values().cloned().collect())
    }

    async fn events_by_ids(&self, ids: &[EventId]) -> Result<Vec<Event>> {
        let wanted: HashSet<EventId> = ids.iter().copied().collect();
        let map = self.events.read().map_err(poisoned)?;
        Ok(wanted.iter().filter_map(|id| map.get(id).cloned()).collect())
    }

    async fn count_events(&self) -> Result<usize> {
        Ok(self.events.read().map_err(poisoned)?.len())
    }
}

#[async_trait]
impl VectorIndex for InMemoryStore {
    async fn replace_all(&self, items: &[IndexedVector]) -> Result<usize> {
        let fresh: Vec<IndexedVector> = items
            .iter()
            .enumerate()
            .map(|(i, item)| IndexedVector {
                id: Some(i as i64 + 1),
                ..item.clone()
            })
            .collect();
        let mut vectors = self.vectors.write().map_err(poisoned)?;
        *vectors = fresh;
        Ok(vectors.len())
    }

    async fn search(&self, query_vec: &[f32], limit: usize) -> Result<Vec<IndexHit>> {
        let vectors = self.vectors.read().map_err(poisoned)?;
        if let Some(iv) = vectors.iter().find(|iv| iv.embedding.len() != query_vec.len()) {
            return Err(anyhow!(
                "embedding dimension mismatch: query has {}, index has {}",
                query_vec.len(),
                iv.embedding.len()
            ));
        }
        let mut hits: Vec<IndexHit> = vectors
            .iter()
            .map(|iv| IndexHit {
                chunk: iv.chunk.clone(),
                score: Some(cosine_similarity(query_vec, &iv.embedding) as f64),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.vectors.read().map_err(poisoned)?.len())
    }
}
