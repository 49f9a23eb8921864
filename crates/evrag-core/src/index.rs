//! Reindexing: chunk → embed → replace.
//!
//! [`Indexer::reindex`] rebuilds the whole vector index from a batch of
//! events. The index is only written after every chunk has been embedded,
//! so a failed run leaves the previous index untouched.
//!
//! # Concurrency
//!
//! Chunks are embedded through an ordered stream with at most
//! `concurrency` calls in flight. Reindex runs are serialized by an async
//! mutex held for the whole run; a second caller waits for the first to
//! finish.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::anyhow;
use futures::lock::Mutex;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::chunk::{chunk_events, DEFAULT_CHUNK_CHARS};
use crate::embedding::Embedder;
use crate::error::RagError;
use crate::models::{Chunk, Event, IndexedVector};
use crate::store::VectorIndex;

/// Indexing parameters.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Window size passed to the chunker.
    pub chunk_chars: usize,
    /// Maximum embedding calls in flight.
    pub concurrency: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            chunk_chars: DEFAULT_CHUNK_CHARS,
            concurrency: 4,
        }
    }
}

pub struct Indexer {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    options: IndexOptions,
    running: Mutex<()>,
}

impl Indexer {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        options: IndexOptions,
    ) -> Self {
        Self {
            embedder,
            index,
            options,
            running: Mutex::new(()),
        }
    }

    /// Chunks that a reindex of `events` would embed, without calling any
    /// provider.
    pub fn plan(&self, events: &[Event]) -> Vec<Chunk> {
        chunk_events(events, self.options.chunk_chars)
    }

    /// Replace the index contents with the chunks of `events`.
    ///
    /// Returns the number of chunks indexed.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidInput`] if `events` is empty or none of them has
    ///   indexable text (nothing is called; the index is kept).
    /// - [`RagError::Ingestion`] if any chunk fails to embed or comes back
    ///   with the wrong dimension; the index is not modified.
    /// - [`RagError::Retrieval`] if the index rejects the write.
    pub async fn reindex(&self, events: &[Event]) -> Result<usize, RagError> {
        if events.is_empty() {
            return Err(RagError::InvalidInput(
                "events must not be empty".to_string(),
            ));
        }

        let chunks = self.plan(events);
        if chunks.is_empty() {
            return Err(RagError::InvalidInput(
                "events contain no indexable text".to_string(),
            ));
        }
        let chunked: HashSet<_> = chunks.iter().map(|c| c.event_id).collect();
        let skipped = events.iter().filter(|ev| !chunked.contains(&ev.id)).count();

        let _running = self.running.lock().await;
        if skipped > 0 {
            warn!(skipped, "events without indexable text were skipped");
        }
        info!(
            events = events.len(),
            chunks = chunks.len(),
            model = self.embedder.model_name(),
            "reindex started"
        );

        let vectors = self.embed_all(&chunks).await?;

        let items: Vec<IndexedVector> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, embedding)| IndexedVector {
                id: None,
                chunk,
                embedding,
            })
            .collect();

        let stored = self
            .index
            .replace_all(&items)
            .await
            .map_err(RagError::Retrieval)?;

        info!(stored, "reindex complete");
        Ok(stored)
    }

    /// Embed every chunk in order. Stops at the first failure and reports
    /// how many chunks had been embedded before it.
    async fn embed_all(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>, RagError> {
        let concurrency = self.options.concurrency.max(1);
        let mut expected_dims = match self.embedder.dims() {
            0 => None,
            d => Some(d),
        };

        let pending: Vec<_> = chunks
            .iter()
            .map(|chunk| self.embedder.embed(&chunk.text))
            .collect();
        let mut results = stream::iter(pending).buffered(concurrency);

        let mut vectors = Vec::with_capacity(chunks.len());
        while let Some(result) = results.next().await {
            let vector = result.map_err(|source| RagError::Ingestion {
                embedded: vectors.len(),
                source,
            })?;

            match expected_dims {
                Some(d) if d != vector.len() => {
                    return Err(RagError::Ingestion {
                        embedded: vectors.len(),
                        source: anyhow!(
                            "embedding dimension mismatch: expected {}, got {}",
                            d,
                            vector.len()
                        ),
                    });
                }
                Some(_) => {}
                None => expected_dims = Some(vector.len()),
            }

            vectors.push(vector);
            if vectors.len() % 100 == 0 {
                debug!(embedded = vectors.len(), total = chunks.len(), "embedding progress");
            }
        }

        Ok(vectors)
    }
}
