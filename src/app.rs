//! Wiring of the core pipeline to its SQLite and HTTP-backed collaborators.
//!
//! [`App`] owns the configuration and the shared store; the indexer and
//! the query pipeline are built from it on demand, each holding `Arc`
//! handles to the same store and providers.

use anyhow::Result;
use std::sync::Arc;

use evrag_core::compose::AnswerComposer;
use evrag_core::index::Indexer;
use evrag_core::pipeline::QueryPipeline;
use evrag_core::retrieve::Retriever;

use crate::completion::create_completion;
use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::migrate;
use crate::sqlite_store::SqliteStore;

pub struct App {
    pub config: Config,
    pub store: Arc<SqliteStore>,
}

impl App {
    /// Connect to the configured database, creating the schema if needed.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;
        Ok(Self {
            config: config.clone(),
            store: Arc::new(SqliteStore::new(pool)),
        })
    }

    /// An indexer writing to this app's vector index.
    ///
    /// # Errors
    ///
    /// Fails if the embedding provider cannot be created (e.g. missing API
    /// key).
    pub fn indexer(&self) -> Result<Indexer> {
        let embedder = create_embedder(&self.config.embedding)?;
        Ok(Indexer::new(
            embedder,
            self.store.clone(),
            self.config.index_options(),
        ))
    }

    /// A query pipeline over this app's store.
    pub fn pipeline(&self) -> Result<QueryPipeline> {
        let embedder = create_embedder(&self.config.embedding)?;
        let completion = create_completion(&self.config.completion)?;
        Ok(QueryPipeline::new(
            embedder,
            Retriever::new(self.store.clone()),
            AnswerComposer::new(completion, self.config.compose_options()),
            self.store.clone(),
            self.config.query_options(),
        ))
    }

    pub async fn close(self) {
        self.store.pool().close().await;
    }
}
