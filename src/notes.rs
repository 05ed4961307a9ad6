//! Highlight persistence
//!
//! The notes store itself lives outside the engine and only ever sees opaque
//! blobs keyed by book id and note id. Highlights go in and out as JSON.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::document::HighlightRecord;
use crate::error::{EngineError, Result};

/// Opaque blob store for per-book notes
#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn put(&self, book_id: &str, note_id: &str, blob: Vec<u8>) -> Result<()>;

    /// All blobs of a book, ordered by note id
    async fn get_all(&self, book_id: &str) -> Result<Vec<(String, Vec<u8>)>>;

    /// Returns whether the note existed
    async fn delete(&self, book_id: &str, note_id: &str) -> Result<bool>;
}

/// Process-local store
#[derive(Default)]
pub struct MemoryNoteStore {
    books: RwLock<HashMap<String, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NoteStore for MemoryNoteStore {
    async fn put(&self, book_id: &str, note_id: &str, blob: Vec<u8>) -> Result<()> {
        self.books
            .write()
            .entry(book_id.to_string())
            .or_default()
            .insert(note_id.to_string(), blob);
        Ok(())
    }

    async fn get_all(&self, book_id: &str) -> Result<Vec<(String, Vec<u8>)>> {
        Ok(self
            .books
            .read()
            .get(book_id)
            .map(|notes| {
                notes
                    .iter()
                    .map(|(id, blob)| (id.clone(), blob.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete(&self, book_id: &str, note_id: &str) -> Result<bool> {
        Ok(self
            .books
            .write()
            .get_mut(book_id)
            .and_then(|notes| notes.remove(note_id))
            .is_some())
    }
}

pub async fn save_highlight(
    store: &dyn NoteStore,
    book_id: &str,
    highlight: &HighlightRecord,
) -> Result<()> {
    let blob = highlight.to_blob()?;
    store
        .put(book_id, &highlight.id, blob)
        .await
        .map_err(|e| EngineError::Store(format!("saving highlight {}: {}", highlight.id, e)))
}

/// Load a book's highlights. Blobs that fail to decode are skipped.
pub async fn load_highlights(store: &dyn NoteStore, book_id: &str) -> Result<Vec<HighlightRecord>> {
    let blobs = store
        .get_all(book_id)
        .await
        .map_err(|e| EngineError::Store(format!("loading notes for {}: {}", book_id, e)))?;

    let mut highlights = Vec::with_capacity(blobs.len());
    for (note_id, blob) in blobs {
        match HighlightRecord::from_blob(&blob) {
            Ok(highlight) => highlights.push(highlight),
            Err(err) => tracing::warn!(book_id, %note_id, error = %err, "Skipping unreadable note"),
        }
    }
    Ok(highlights)
}

pub async fn delete_highlight(store: &dyn NoteStore, book_id: &str, highlight_id: &str) -> Result<bool> {
    store
        .delete(book_id, highlight_id)
        .await
        .map_err(|e| EngineError::Store(format!("deleting highlight {}: {}", highlight_id, e)))
}
