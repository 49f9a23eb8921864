//! SQLite-backed [`EventStore`] and [`VectorIndex`].
//!
//! Events live in the `events` table; embedded chunks in `event_vectors`,
//! with embeddings stored as little-endian `f32` BLOBs. Vector search is
//! brute-force cosine similarity over every stored row, which is plenty for
//! a catalogue of a few thousand events.
//!
//! [`VectorIndex::replace_all`] deletes and re-inserts inside a single
//! transaction, so readers on other connections keep seeing the previous
//! index until the commit.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use evrag_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use evrag_core::models::{Chunk, Event, EventId, IndexedVector};
use evrag_core::store::{EventStore, IndexHit, VectorIndex};

/// Upper bound on bound parameters per `IN (...)` lookup.
const LOOKUP_BATCH: usize = 500;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn to_ts(dt: Option<DateTime<Utc>>) -> Option<i64> {
    dt.map(|d| d.timestamp())
}

fn from_ts(ts: Option<i64>) -> Option<DateTime<Utc>> {
    ts.and_then(|t| DateTime::from_timestamp(t, 0))
}

fn event_from_row(row: &SqliteRow) -> Result<Event> {
    Ok(Event {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        area: row.try_get("area")?,
        category: row.try_get("category")?,
        start: from_ts(row.try_get("start_at")?),
        end: from_ts(row.try_get("end_at")?),
        website: row.try_get("website")?,
        image_url: row.try_get("image_url")?,
    })
}

fn chunk_from_row(row: &SqliteRow) -> Result<Chunk> {
    let chunk_index: i64 = row.try_get("chunk_index")?;
    Ok(Chunk {
        event_id: row.try_get("event_id")?,
        chunk_index: chunk_index as usize,
        text: row.try_get("content")?,
        event_name: row.try_get("event_name")?,
        area: row.try_get("area")?,
        start: from_ts(row.try_get("start_at")?),
        end: from_ts(row.try_get("end_at")?),
        website: row.try_get("website")?,
    })
}

const EVENT_COLUMNS: &str =
    "id, name, description, area, category, start_at, end_at, website, image_url";

#[async_trait]
impl EventStore for SqliteStore {
    async fn upsert_events(&self, events: &[Event]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        for ev in events {
            sqlx::query(
                r#"
                INSERT INTO events (id, name, description, area, category,
                                    start_at, end_at, website, image_url)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    description = excluded.description,
                    area = excluded.area,
                    category = excluded.category,
                    start_at = excluded.start_at,
                    end_at = excluded.end_at,
                    website = excluded.website,
                    image_url = excluded.image_url
                "#,
            )
            .bind(ev.id)
            .bind(&ev.name)
            .bind(&ev.description)
            .bind(&ev.area)
            .bind(&ev.category)
            .bind(to_ts(ev.start))
            .bind(to_ts(ev.end))
            .bind(&ev.website)
            .bind(&ev.image_url)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to upsert event {}", ev.id))?;
        }

        tx.commit().await?;
        Ok(events.len())
    }

    async fn all_events(&self) -> Result<Vec<Event>> {
        let rows = sqlx::query(&format!("SELECT {} FROM events ORDER BY id", EVENT_COLUMNS))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(event_from_row).collect()
    }

    async fn events_by_ids(&self, ids: &[EventId]) -> Result<Vec<Event>> {
        let mut events = Vec::with_capacity(ids.len());

        for batch in ids.chunks(LOOKUP_BATCH) {
            let placeholders = vec!["?"; batch.len()].join(", ");
            let sql = format!(
                "SELECT {} FROM events WHERE id IN ({})",
                EVENT_COLUMNS, placeholders
            );
            let mut query = sqlx::query(&sql);
            for id in batch {
                query = query.bind(id);
            }
            let rows = query.fetch_all(&self.pool).await?;
            for row in &rows {
                events.push(event_from_row(row)?);
            }
        }

        Ok(events)
    }

    async fn count_events(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }
}

#[async_trait]
impl VectorIndex for SqliteStore {
    async fn replace_all(&self, items: &[IndexedVector]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM event_vectors")
            .execute(&mut *tx)
            .await?;

        for item in items {
            let chunk = &item.chunk;
            sqlx::query(
                r#"
                INSERT INTO event_vectors (event_id, chunk_index, content, event_name,
                                           area, start_at, end_at, website, dims, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(chunk.event_id)
            .bind(chunk.chunk_index as i64)
            .bind(&chunk.text)
            .bind(&chunk.event_name)
            .bind(&chunk.area)
            .bind(to_ts(chunk.start))
            .bind(to_ts(chunk.end))
            .bind(&chunk.website)
            .bind(item.embedding.len() as i64)
            .bind(vec_to_blob(&item.embedding))
            .execute(&mut *tx)
            .await
            .with_context(|| {
                format!(
                    "Failed to insert vector for event {} chunk {}",
                    chunk.event_id, chunk.chunk_index
                )
            })?;
        }

        tx.commit().await?;
        Ok(items.len())
    }

    async fn search(&self, query_vec: &[f32], limit: usize) -> Result<Vec<IndexHit>> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, chunk_index, content, event_name, area,
                   start_at, end_at, website, embedding
            FROM event_vectors
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.try_get("embedding")?;
            let embedding = blob_to_vec(&blob);
            if embedding.len() != query_vec.len() {
                bail!(
                    "embedding dimension mismatch: query has {}, index has {}",
                    query_vec.len(),
                    embedding.len()
                );
            }
            let score = cosine_similarity(query_vec, &embedding) as f64;
            hits.push(IndexHit {
                chunk: chunk_from_row(row)?,
                score: Some(score),
            });
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);

        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM event_vectors")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }
}
