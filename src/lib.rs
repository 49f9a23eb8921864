//! # evrag
//!
//! Retrieval-augmented question answering over an event catalogue.
//!
//! Events are imported into SQLite, split into chunks, embedded, and
//! indexed. A question is embedded, matched against the index, reduced to
//! the best-scoring distinct events, and answered by a chat model grounded
//! on those events.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌───────────────┐
//! │ JSON / API │──▶│   Indexer    │──▶│    SQLite     │
//! │   events   │   │ chunk+embed  │   │ events+vectors│
//! └────────────┘   └──────────────┘   └───────┬───────┘
//!                                             │
//!                       ┌─────────────────────┤
//!                       ▼                     ▼
//!                 ┌──────────┐          ┌──────────┐
//!                 │   CLI    │          │   HTTP   │
//!                 │ (evrag)  │          │  (axum)  │
//!                 └──────────┘          └──────────┘
//! ```
//!
//! The pipeline itself (chunking, reduction, composition, orchestration)
//! lives in the `evrag-core` crate; this crate supplies the SQLite store,
//! the OpenAI-compatible providers, and the command-line and HTTP surfaces.
//!
//! ## Quick Start
//!
//! ```bash
//! evrag init                          # create database
//! evrag import events.json            # load the catalogue
//! evrag reindex                       # embed and index
//! evrag ask "outdoor festivals this weekend?"
//! evrag serve                         # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite event store and vector index |
//! | [`openai`] | HTTP client for OpenAI-compatible APIs |
//! | [`embedding`] | Embedding providers |
//! | [`completion`] | Completion providers |
//! | [`app`] | Pipeline wiring |
//! | [`server`] | HTTP server |

pub mod app;
pub mod ask;
pub mod completion;
pub mod config;
pub mod db;
pub mod embedding;
pub mod import;
pub mod migrate;
pub mod openai;
pub mod reindex;
pub mod server;
pub mod sqlite_store;
pub mod stats;
