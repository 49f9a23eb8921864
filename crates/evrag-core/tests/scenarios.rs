//! End-to-end scenarios over the in-memory store.
//!
//! Uses a deterministic bag-of-words embedder over a fixed vocabulary so
//! similarities are predictable without a model.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use futures::executor::block_on;

use evrag_core::completion::CompletionProvider;
use evrag_core::compose::{nothing_found_instruction, AnswerComposer, ComposeOptions};
use evrag_core::embedding::Embedder;
use evrag_core::index::{IndexOptions, Indexer};
use evrag_core::models::{Chunk, ConversationTurn, Event, IndexedVector, Role};
use evrag_core::pipeline::{QueryOptions, QueryPipeline, QueryRequest};
use evrag_core::reduce::reduce;
use evrag_core::retrieve::Retriever;
use evrag_core::store::memory::InMemoryStore;
use evrag_core::store::{IndexHit, VectorIndex};
use evrag_core::RagError;

const VOCAB: &[&str] = &[
    "fall", "festival", "outdoor", "downtown", "art", "workshop", "indoor", "class",
];

/// Counts vocabulary words; unknown words are ignored. Optionally fails on
/// the call numbered `fail_at`.
struct VocabEmbedder {
    calls: AtomicUsize,
    fail_at: Option<usize>,
}

impl VocabEmbedder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_at: None,
        }
    }

    fn failing_at(n: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_at: Some(n),
        }
    }
}

#[async_trait]
impl Embedder for VocabEmbedder {
    fn model_name(&self) -> &str {
        "vocab"
    }

    fn dims(&self) -> usize {
        VOCAB.len()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if Some(n) == self.fail_at {
            anyhow::bail!("upstream timeout");
        }
        let mut v = vec![0.0f32; VOCAB.len()];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .map(str::to_lowercase)
        {
            if let Some(i) = VOCAB.iter().position(|w| *w == word) {
                v[i] += 1.0;
            }
        }
        Ok(v)
    }
}

/// Records the messages of every completion request.
#[derive(Default)]
struct RecordingCompletion {
    requests: Mutex<Vec<Vec<ConversationTurn>>>,
}

#[async_trait]
impl CompletionProvider for RecordingCompletion {
    fn model_name(&self) -> &str {
        "recording"
    }

    async fn complete(&self, messages: &[ConversationTurn]) -> Result<String> {
        self.requests.lock().unwrap().push(messages.to_vec());
        Ok("answer".to_string())
    }
}

/// A vector index returning a fixed set of hits for every search.
struct CannedIndex(Vec<IndexHit>);

#[async_trait]
impl VectorIndex for CannedIndex {
    async fn replace_all(&self, _items: &[IndexedVector]) -> Result<usize> {
        anyhow::bail!("read-only")
    }

    async fn search(&self, _query_vec: &[f32], limit: usize) -> Result<Vec<IndexHit>> {
        Ok(self.0.iter().take(limit).cloned().collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.0.len())
    }
}

fn event(id: i64, name: &str, description: &str) -> Event {
    Event {
        id,
        name: name.to_string(),
        description: description.to_string(),
        area: Some("Tokyo".to_string()),
        category: None,
        start: None,
        end: None,
        website: None,
        image_url: None,
    }
}

fn chunk(event_id: i64, chunk_index: usize) -> Chunk {
    Chunk {
        event_id,
        chunk_index,
        text: format!("text {}", chunk_index),
        event_name: format!("event {}", event_id),
        area: None,
        start: None,
        end: None,
        website: None,
    }
}

fn two_events() -> Vec<Event> {
    vec![
        event(1, "Fall Festival", "Outdoor festival downtown"),
        event(2, "Art Workshop", "Indoor art class"),
    ]
}

#[test]
fn scenario_a_relevant_event_ranks_first() {
    let store = Arc::new(InMemoryStore::with_events(two_events()));
    let embedder = Arc::new(VocabEmbedder::new());
    let completion = Arc::new(RecordingCompletion::default());

    let indexer = Indexer::new(embedder.clone(), store.clone(), IndexOptions::default());
    let indexed = block_on(indexer.reindex(&two_events())).unwrap();
    assert_eq!(indexed, 2);

    let pipeline = QueryPipeline::new(
        embedder,
        Retriever::new(store.clone()),
        AnswerComposer::new(completion.clone(), ComposeOptions::default()),
        store,
        QueryOptions::default(),
    );
    let resp = block_on(pipeline.run(&QueryRequest::question("outdoor festival"))).unwrap();

    assert_eq!(resp.sources[0].event_id(), 1);
    if let Some(art) = resp.sources.iter().find(|s| s.event_id() == 2) {
        assert!(resp.sources[0].similarity > art.similarity);
    }
    assert_eq!(resp.events[0].event.id, 1);
    assert_eq!(resp.events[0].event.name, "Fall Festival");

    let requests = completion.requests.lock().unwrap();
    assert!(requests[0][0].content.contains("Title: Fall Festival"));
    assert!(!requests[0][0].content.contains("Title: Art Workshop"));
}

#[test]
fn scenario_b_low_scores_use_nothing_found_template() {
    let hits: Vec<IndexHit> = (1..=4)
        .map(|id| IndexHit {
            chunk: chunk(id, 0),
            score: Some(0.3),
        })
        .collect();
    let index = Arc::new(CannedIndex(hits));
    let completion = Arc::new(RecordingCompletion::default());
    let opts = ComposeOptions::default();

    let pipeline = QueryPipeline::new(
        Arc::new(VocabEmbedder::new()),
        Retriever::new(index),
        AnswerComposer::new(completion.clone(), opts.clone()),
        Arc::new(InMemoryStore::new()),
        QueryOptions {
            min_similarity: 0.55,
            ..QueryOptions::default()
        },
    );
    let resp = block_on(pipeline.run(&QueryRequest::question("outdoor festival"))).unwrap();

    assert!(resp.sources.is_empty());
    assert!(resp.events.is_empty());

    let requests = completion.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0][0].role, Role::System);
    assert_eq!(requests[0][0].content, nothing_found_instruction(&opts));
    assert_eq!(
        requests[0].last().map(|t| t.content.as_str()),
        Some("outdoor festival")
    );
}

#[test]
fn scenario_c_duplicate_event_keeps_best_score() {
    let candidates = vec![
        evrag_core::models::Candidate {
            chunk: chunk(7, 0),
            similarity: Some(0.6),
        },
        evrag_core::models::Candidate {
            chunk: chunk(7, 1),
            similarity: Some(0.8),
        },
    ];
    let out = reduce(&candidates, 0.55, 5);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].event_id(), 7);
    assert_eq!(out[0].similarity, 0.8);
}

#[test]
fn failed_reindex_leaves_previous_index() {
    let store = Arc::new(InMemoryStore::new());

    let good = Indexer::new(
        Arc::new(VocabEmbedder::new()),
        store.clone(),
        IndexOptions::default(),
    );
    block_on(good.reindex(&two_events())).unwrap();
    let before = store.vectors().unwrap();
    assert_eq!(before.len(), 2);

    let mut bigger = two_events();
    bigger.extend((3..8).map(|id| event(id, "Fall Festival", "outdoor")));
    let failing = Indexer::new(
        Arc::new(VocabEmbedder::failing_at(4)),
        store.clone(),
        IndexOptions {
            chunk_chars: 500,
            concurrency: 1,
        },
    );
    let err = block_on(failing.reindex(&bigger)).unwrap_err();
    match err {
        RagError::Ingestion { embedded, .. } => assert_eq!(embedded, 4),
        other => panic!("expected ingestion error, got {other}"),
    }

    assert_eq!(store.vectors().unwrap(), before);
}

#[test]
fn conversation_history_is_forwarded_in_order() {
    let store = Arc::new(InMemoryStore::with_events(two_events()));
    let embedder = Arc::new(VocabEmbedder::new());
    let completion = Arc::new(RecordingCompletion::default());
    block_on(Indexer::new(embedder.clone(), store.clone(), IndexOptions::default()).reindex(&two_events()))
        .unwrap();

    let pipeline = QueryPipeline::new(
        embedder,
        Retriever::new(store.clone()),
        AnswerComposer::new(completion.clone(), ComposeOptions::default()),
        store,
        QueryOptions::default(),
    );
    let req = QueryRequest {
        messages: vec![
            ConversationTurn::user("I like art"),
            ConversationTurn::assistant("There is an art workshop."),
            ConversationTurn::user("indoor art class"),
        ],
        top_k: Some(2),
    };
    block_on(pipeline.run(&req)).unwrap();

    let requests = completion.requests.lock().unwrap();
    let roles: Vec<Role> = requests[0].iter().map(|t| t.role).collect();
    assert_eq!(
        roles,
        vec![Role::System, Role::User, Role::Assistant, Role::User]
    );
    assert_eq!(requests[0][3].content, "indoor art class");
}
