//! Position persistence
//!
//! The tracker decides when and what to persist; a [`PositionStore`] decides
//! where. Snapshots are keyed by book id and stored as opaque JSON records.

mod file;

use std::collections::HashMap;

use thiserror::Error;

use crate::tracker::{ReadingPosition, ReadingSession};

pub use file::FileStore;

/// Persistence errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Storage for saved positions and reading sessions
pub trait PositionStore {
    /// Last saved position for a book
    fn get(&self, book_id: &str) -> Result<Option<ReadingPosition>, StoreError>;

    /// Replace the saved position for a book
    fn upsert(&mut self, book_id: &str, position: &ReadingPosition) -> Result<(), StoreError>;

    /// Forget the saved position for a book
    fn delete(&mut self, book_id: &str) -> Result<bool, StoreError>;

    /// Append a finished reading session
    fn record_session(&mut self, session: &ReadingSession) -> Result<(), StoreError>;

    /// Sessions for a book, oldest first
    fn sessions_for_book(&self, book_id: &str) -> Result<Vec<ReadingSession>, StoreError>;
}

/// In-memory store holding serialized snapshots
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    positions: HashMap<String, String>,
    sessions: Vec<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw JSON snapshot for a book
    pub fn raw(&self, book_id: &str) -> Option<&str> {
        self.positions.get(book_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl PositionStore for MemoryStore {
    fn get(&self, book_id: &str) -> Result<Option<ReadingPosition>, StoreError> {
        self.positions
            .get(book_id)
            .map(|raw| serde_json::from_str(raw))
            .transpose()
            .map_err(StoreError::from)
    }

    fn upsert(&mut self, book_id: &str, position: &ReadingPosition) -> Result<(), StoreError> {
        let raw = serde_json::to_string(position)?;
        self.positions.insert(book_id.to_string(), raw);
        Ok(())
    }

    fn delete(&mut self, book_id: &str) -> Result<bool, StoreError> {
        Ok(self.positions.remove(book_id).is_some())
    }

    fn record_session(&mut self, session: &ReadingSession) -> Result<(), StoreError> {
        self.sessions.push(serde_json::to_string(session)?);
        Ok(())
    }

    fn sessions_for_book(&self, book_id: &str) -> Result<Vec<ReadingSession>, StoreError> {
        let mut out = Vec::new();
        for raw in &self.sessions {
            let session: ReadingSession = serde_json::from_str(raw)?;
            if session.book_id == book_id {
                out.push(session);
            }
        }
        Ok(out)
    }
}
