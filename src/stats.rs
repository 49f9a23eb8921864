//! Database statistics.
//!
//! A quick summary of what is stored and indexed: event counts, vector
//! counts, coverage, and the embedding dimension in use. Used by
//! `evrag stats` to confirm that imports and reindexes did what they should.

use anyhow::Result;

use crate::app::App;
use crate::config::Config;

pub async fn run_stats(config: &Config) -> Result<()> {
    let app = App::open(config).await?;
    let pool = app.store.pool();

    let total_events: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events")
        .fetch_one(pool)
        .await?;

    let total_vectors: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM event_vectors")
        .fetch_one(pool)
        .await?;

    let indexed_events: i64 =
        sqlx::query_scalar("SELECT COUNT(DISTINCT event_id) FROM event_vectors")
            .fetch_one(pool)
            .await?;

    let dims: Option<i64> = sqlx::query_scalar("SELECT MAX(dims) FROM event_vectors")
        .fetch_one(pool)
        .await?;

    let upcoming: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE start_at >= ?")
        .bind(chrono::Utc::now().timestamp())
        .fetch_one(pool)
        .await?;

    app.close().await;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("evrag database stats");
    println!("====================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Events:      {}", total_events);
    println!("  Upcoming:    {}", upcoming);
    println!("  Vectors:     {}", total_vectors);
    println!(
        "  Indexed:     {} / {} ({}%)",
        indexed_events,
        total_events,
        if total_events > 0 {
            (indexed_events * 100) / total_events
        } else {
            0
        }
    );
    match dims {
        Some(d) => println!("  Dimensions:  {}", d),
        None => println!("  Dimensions:  -"),
    }
    println!(
        "  Embedding:   {} ({})",
        config.embedding.model, config.embedding.provider
    );
    println!(
        "  Completion:  {} ({})",
        config.completion.model, config.completion.provider
    );
    println!();

    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
