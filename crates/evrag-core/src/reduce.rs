//! Candidate reduction: similarity threshold, per-event deduplication,
//! ranking, and truncation.
//!
//! A single event usually contributes several chunks to a raw
//! nearest-neighbor result. Presenting each event once, with its best
//! chunk, is required both for the `sources`/`events` lists returned to the
//! caller and (optionally) for the answer-composition context.
//!
//! # Algorithm
//!
//! 1. Drop candidates whose similarity is missing, NaN, or `< min_similarity`.
//! 2. Group by event id, keeping the candidate with the highest similarity.
//!    Ties keep the first one seen.
//! 3. Sort descending by similarity (stable).
//! 4. Truncate to `max_results`.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::{Candidate, EventId, ReducedCandidate};

/// Similarity threshold used when none is configured.
pub const DEFAULT_MIN_SIMILARITY: f64 = 0.55;

/// Step 1 alone: keep candidates scoring at least `min_similarity`, in
/// input order.
pub fn filter_by_similarity(candidates: &[Candidate], min_similarity: f64) -> Vec<Candidate> {
    candidates
        .iter()
        .filter(|c| passes(c.similarity, min_similarity))
        .cloned()
        .collect()
}

/// Full reduction pipeline (steps 1–4).
pub fn reduce(
    candidates: &[Candidate],
    min_similarity: f64,
    max_results: usize,
) -> Vec<ReducedCandidate> {
    if max_results == 0 {
        return Vec::new();
    }

    let mut best: Vec<ReducedCandidate> = Vec::new();
    let mut slot: HashMap<EventId, usize> = HashMap::new();

    for c in candidates {
        let score = match c.similarity {
            Some(s) if passes(Some(s), min_similarity) => s,
            _ => continue,
        };
        match slot.get(&c.chunk.event_id) {
            Some(&i) => {
                if score > best[i].similarity {
                    best[i] = ReducedCandidate {
                        chunk: c.chunk.clone(),
                        similarity: score,
                    };
                }
            }
            None => {
                slot.insert(c.chunk.event_id, best.len());
                best.push(ReducedCandidate {
                    chunk: c.chunk.clone(),
                    similarity: score,
                });
            }
        }
    }

    best.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
    });
    best.truncate(max_results);
    best
}

fn passes(similarity: Option<f64>, min_similarity: f64) -> bool {
    matches!(similarity, Some(s) if !s.is_nan() && s >= min_similarity)
}
