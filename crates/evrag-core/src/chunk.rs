//! Fixed-window event chunker.
//!
//! Turns an [`Event`] into [`Chunk`]s by joining its name and description
//! into one normalized string and cutting it into non-overlapping windows of
//! `chunk_chars` characters.
//!
//! # Algorithm
//!
//! 1. Build `"{name}\n{description}"` and trim outer whitespace.
//! 2. Walk the string in windows of `chunk_chars` Unicode scalar values.
//!    Windows always end on a char boundary, so multi-byte text is never
//!    split mid-character.
//! 3. Drop windows that are empty or whitespace-only.
//! 4. Copy the event's display fields onto every emitted chunk.
//!
//! An event with a blank description yields exactly one chunk (its name),
//! and an event with a blank name and description yields none.
//!
//! # Example
//!
//! ```rust
//! use evrag_core::chunk::chunk_event;
//! use evrag_core::models::Event;
//!
//! let ev = Event {
//!     id: 1,
//!     name: "Fall Festival".to_string(),
//!     description: "Outdoor festival downtown".to_string(),
//!     area: None,
//!     category: None,
//!     start: None,
//!     end: None,
//!     website: None,
//!     image_url: None,
//! };
//! let chunks = chunk_event(&ev, 500);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].text, "Fall Festival\nOutdoor festival downtown");
//! ```

use crate::models::{Chunk, Event};

/// Window size used when none is configured.
pub const DEFAULT_CHUNK_CHARS: usize = 500;

/// The string an event is chunked from: name and description on separate
/// lines, outer whitespace trimmed.
pub fn normalized_text(event: &Event) -> String {
    format!("{}\n{}", event.name, event.description)
        .trim()
        .to_string()
}

/// Split one event into fixed-size windows.
///
/// A `chunk_chars` of zero is treated as one.
pub fn chunk_event(event: &Event, chunk_chars: usize) -> Vec<Chunk> {
    let text = normalized_text(event);
    let mut chunks = Vec::new();

    for window in char_windows(&text, chunk_chars.max(1)) {
        if window.trim().is_empty() {
            continue;
        }
        chunks.push(Chunk {
            event_id: event.id,
            chunk_index: chunks.len(),
            text: window.to_string(),
            event_name: event.name.clone(),
            area: event.area.clone(),
            start: event.start,
            end: event.end,
            website: event.website.clone(),
        });
    }

    chunks
}

/// Chunk every event in order, concatenating the results.
pub fn chunk_events(events: &[Event], chunk_chars: usize) -> Vec<Chunk> {
    events
        .iter()
        .flat_map(|ev| chunk_event(ev, chunk_chars))
        .collect()
}

/// Slice `text` into consecutive windows of at most `size` chars.
fn char_windows(text: &str, size: usize) -> Vec<&str> {
    let mut windows = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (idx, _) in text.char_indices() {
        if count == size {
            windows.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        windows.push(&text[start..]);
    }

    windows
}
