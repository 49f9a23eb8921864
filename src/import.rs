//! Event import from JSON files.
//!
//! Accepts either a bare array of events or an object wrapping them under
//! `events`. Records are upserted by id, so re-importing a file is safe.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

use evrag_core::models::Event;
use evrag_core::store::EventStore;

use crate::app::App;
use crate::config::Config;

#[derive(Deserialize)]
#[serde(untagged)]
enum EventFile {
    List(Vec<Event>),
    Wrapped { events: Vec<Event> },
}

/// Parse an events document.
pub fn parse_events(content: &str) -> Result<Vec<Event>> {
    let file: EventFile =
        serde_json::from_str(content).with_context(|| "Failed to parse events JSON")?;
    Ok(match file {
        EventFile::List(events) => events,
        EventFile::Wrapped { events } => events,
    })
}

pub async fn run_import(config: &Config, path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read events file: {}", path.display()))?;
    let events = parse_events(&content)?;
    if events.is_empty() {
        bail!("No events found in {}", path.display());
    }

    let unnamed = events.iter().filter(|e| e.name.trim().is_empty()).count();
    if unnamed > 0 {
        warn!(unnamed, "imported events without a name");
    }

    let app = App::open(config).await?;
    let written = app.store.upsert_events(&events).await?;
    let total = app.store.count_events().await?;
    app.close().await;

    info!(written, total, path = %path.display(), "events imported");
    println!("Imported {} events from {}", written, path.display());
    println!("  Total events: {}", total);
    println!("Run `evrag reindex` to refresh the vector index.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_array() {
        let events = parse_events(r#"[{"id": 1, "name": "Fall Festival"}, {"id": 2}]"#).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name, "Fall Festival");
        assert_eq!(events[1].name, "");
    }

    #[test]
    fn test_parse_wrapped_object() {
        let events = parse_events(
            r#"{"events": [{"id": 7, "name": "Jazz Night", "start_datetime": "2025-10-01T18:00:00Z"}]}"#,
        )
        .unwrap();
        assert_eq!(events[0].id, 7);
        assert!(events[0].start.is_some());
    }

    #[test]
    fn test_parse_rejects_missing_id() {
        assert!(parse_events(r#"[{"name": "No id"}]"#).is_err());
    }
}
