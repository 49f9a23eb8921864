//! `evrag reindex`: rebuild the vector index from the event store.

use anyhow::{bail, Result};
use std::time::Instant;

use evrag_core::store::EventStore;

use crate::app::App;
use crate::config::Config;

pub async fn run_reindex(config: &Config, dry_run: bool) -> Result<()> {
    let app = App::open(config).await?;
    let events = app.store.all_events().await?;

    if events.is_empty() {
        app.close().await;
        bail!("No events in the database. Run `evrag import <file>` first.");
    }

    if dry_run {
        let chunks = evrag_core::chunk::chunk_events(&events, config.chunking.chunk_chars);
        let indexed_events = {
            let mut ids: Vec<i64> = chunks.iter().map(|c| c.event_id).collect();
            ids.dedup();
            ids.len()
        };
        app.close().await;

        println!("Reindex (dry run)");
        println!("  Events:          {}", events.len());
        println!("  Indexable:       {}", indexed_events);
        println!("  Skipped (empty): {}", events.len() - indexed_events);
        println!("  Chunks:          {}", chunks.len());
        println!("  Chunk size:      {} chars", config.chunking.chunk_chars);
        return Ok(());
    }

    if !config.embedding.is_enabled() {
        app.close().await;
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let indexer = app.indexer()?;
    let started = Instant::now();
    let result = indexer.reindex(&events).await;
    app.close().await;
    let stored = result?;

    println!(
        "Reindexed {} events into {} chunks ({:.1}s)",
        events.len(),
        stored,
        started.elapsed().as_secs_f64()
    );
    Ok(())
}
