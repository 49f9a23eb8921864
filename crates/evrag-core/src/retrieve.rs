//! Nearest-neighbor retrieval over the vector index.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;

use crate::error::RagError;
use crate::models::Candidate;
use crate::store::VectorIndex;

/// Shapes search requests for a [`VectorIndex`] and normalizes its hits
/// into [`Candidate`]s.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
}

impl Retriever {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index }
    }

    /// The `k` nearest chunks to `query_vec`, highest similarity first.
    ///
    /// Non-finite scores are reported as missing. Hits beyond `k` returned
    /// by a permissive backend are discarded. No retry is attempted.
    pub async fn search(&self, query_vec: &[f32], k: usize) -> Result<Vec<Candidate>, RagError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let hits = self
            .index
            .search(query_vec, k)
            .await
            .map_err(RagError::Retrieval)?;

        let mut candidates: Vec<Candidate> = hits
            .into_iter()
            .map(|hit| Candidate {
                chunk: hit.chunk,
                similarity: hit.score.filter(|s| s.is_finite()),
            })
            .collect();

        // Scored hits first, best first; unscored hits keep their order at the end.
        candidates.sort_by(|a, b| match (a.similarity, b.similarity) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        candidates.truncate(k);

        debug!(k, returned = candidates.len(), "vector search complete");
        Ok(candidates)
    }
}
