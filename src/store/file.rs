//! Directory-backed position store
//!
//! Layout:
//! ```text
//! <dir>/<percent-encoded book id>.json   latest snapshot per book
//! <dir>/sessions.jsonl                   one reading session per line
//! ```

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::{PositionStore, StoreError};
use crate::tracker::{ReadingPosition, ReadingSession};

const SESSIONS_FILE: &str = "sessions.jsonl";

/// Stores snapshots as JSON files under a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        tracing::debug!(dir = %dir.display(), "Opened position store");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn position_path(&self, book_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", urlencoding::encode(book_id)))
    }

    fn sessions_path(&self) -> PathBuf {
        self.dir.join(SESSIONS_FILE)
    }
}

impl PositionStore for FileStore {
    fn get(&self, book_id: &str) -> Result<Option<ReadingPosition>, StoreError> {
        match fs::read_to_string(self.position_path(book_id)) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn upsert(&mut self, book_id: &str, position: &ReadingPosition) -> Result<(), StoreError> {
        let path = self.position_path(book_id);
        let tmp = path.with_extension("json.tmp");

        // Write then rename so a crash never leaves a truncated snapshot
        fs::write(&tmp, serde_json::to_vec_pretty(position)?)?;
        fs::rename(&tmp, &path)?;

        tracing::debug!(book_id = %book_id, path = %path.display(), "Wrote position snapshot");
        Ok(())
    }

    fn delete(&mut self, book_id: &str) -> Result<bool, StoreError> {
        match fs::remove_file(self.position_path(book_id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn record_session(&mut self, session: &ReadingSession) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(session)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.sessions_path())?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    fn sessions_for_book(&self, book_id: &str) -> Result<Vec<ReadingSession>, StoreError> {
        let file = match fs::File::open(self.sessions_path()) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut sessions = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let session: ReadingSession = serde_json::from_str(&line)?;
            if session.book_id == book_id {
                sessions.push(session);
            }
        }
        Ok(sessions)
    }
}
