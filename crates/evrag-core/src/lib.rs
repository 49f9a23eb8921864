//! # evrag core
//!
//! Runtime-agnostic logic for evrag, a retrieval-augmented question
//! answering pipeline over an event catalogue: data models, chunking,
//! embedding and completion traits, store traits, result reduction,
//! answer composition, indexing, and the query pipeline.
//!
//! This crate contains no tokio, sqlx, HTTP clients, or filesystem I/O.
//! Concrete providers and the SQLite store live in the `evrag` app crate.
//!
//! ## Data Flow
//!
//! ```text
//! ingestion:  Event ──▶ chunk ──▶ Embedder ──▶ VectorIndex::replace_all
//!
//! query:      turns ──▶ Embedder ──▶ Retriever ──▶ reduce ──▶ AnswerComposer
//!                                                    │
//!                                                    └──▶ EventStore (resolve)
//! ```

pub mod chunk;
pub mod completion;
pub mod compose;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod pipeline;
pub mod reduce;
pub mod retrieve;
pub mod store;

pub use error::{ErrorKind, PipelineStage, RagError};
