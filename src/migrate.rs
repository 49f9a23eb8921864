use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

use crate::config::Config;
use crate::db;

/// Create the schema if it does not exist yet. Safe to run repeatedly.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    info!(path = %config.db.path.display(), "database initialized");
    Ok(())
}

/// Apply the schema to an open pool.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Event catalogue
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            area TEXT,
            category TEXT,
            start_at INTEGER,
            end_at INTEGER,
            website TEXT,
            image_url TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Embedded chunks; rebuilt wholesale by every reindex
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS event_vectors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id INTEGER NOT NULL,
            chunk_index INTEGER NOT NULL,
            content TEXT NOT NULL,
            event_name TEXT NOT NULL,
            area TEXT,
            start_at INTEGER,
            end_at INTEGER,
            website TEXT,
            dims INTEGER NOT NULL,
            embedding BLOB NOT NULL,
            UNIQUE(event_id, chunk_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_event_vectors_event_id ON event_vectors(event_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_start_at ON events(start_at)")
        .execute(pool)
        .await?;

    Ok(())
}
