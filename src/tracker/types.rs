//! Tracker data model
//!
//! Positions, change events and reading sessions. All of these are plain
//! values; the tracker owns the current and last-saved positions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::location::{Location, RangeLocation};

/// A snapshot of where the reader is
///
/// Persisted as
/// `{ cfi, chapterId, chapterProgress, bookProgress, timestamp, viewportOffset?, pageNumber?, totalPages? }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingPosition {
    #[serde(rename = "cfi")]
    pub location: Location,
    pub chapter_id: String,
    /// Progress through the current chapter, 0.0 to 1.0
    pub chapter_progress: f64,
    /// Progress through the whole book, 0.0 to 1.0
    pub book_progress: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub viewport_offset: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub page_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub total_pages: Option<u32>,
}

impl ReadingPosition {
    /// Check whether two positions point at the same place on the same page
    pub fn same_place(&self, other: &ReadingPosition) -> bool {
        self.location.same_address(&other.location) && self.page_number == other.page_number
    }
}

/// What caused a position change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Scroll,
    Selection,
    Chapter,
    Page,
}

/// Difference between two positions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionDelta {
    /// Scroll offset change in pixels
    pub offset: f64,
    pub chapter_progress: f64,
    pub book_progress: f64,
}

impl PositionDelta {
    pub fn between(previous: &ReadingPosition, current: &ReadingPosition) -> Self {
        Self {
            offset: current.viewport_offset.unwrap_or(0.0) - previous.viewport_offset.unwrap_or(0.0),
            chapter_progress: current.chapter_progress - previous.chapter_progress,
            book_progress: current.book_progress - previous.book_progress,
        }
    }
}

/// Emitted to subscribers on every committed change; never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionChangeEvent {
    pub current: ReadingPosition,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub previous: Option<ReadingPosition>,
    pub change_type: ChangeType,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub delta: Option<PositionDelta>,
    /// The selection, for `ChangeType::Selection` events
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub selection: Option<RangeLocation>,
}

impl PositionChangeEvent {
    pub fn new(
        current: ReadingPosition,
        previous: Option<ReadingPosition>,
        change_type: ChangeType,
    ) -> Self {
        let delta = previous
            .as_ref()
            .map(|previous| PositionDelta::between(previous, &current));
        Self {
            current,
            previous,
            change_type,
            delta,
            selection: None,
        }
    }

    pub fn with_selection(mut self, selection: RangeLocation) -> Self {
        self.selection = Some(selection);
        self
    }
}

/// One stretch of reading between `start` and `stop`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingSession {
    pub id: Uuid,
    pub book_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub start_location: Location,
    pub end_location: Option<Location>,
    pub start_progress: f64,
    pub end_progress: Option<f64>,
    pub duration_seconds: Option<i64>,
}

impl ReadingSession {
    /// Open a session at `position`
    pub fn start(book_id: &str, position: &ReadingPosition, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            book_id: book_id.to_string(),
            started_at: now,
            ended_at: None,
            start_location: position.location.clone(),
            end_location: None,
            start_progress: position.book_progress,
            end_progress: None,
            duration_seconds: None,
        }
    }

    /// Close the session, optionally at a final position
    pub fn finish(&mut self, position: Option<&ReadingPosition>, now: DateTime<Utc>) {
        self.ended_at = Some(now);
        self.duration_seconds = Some((now - self.started_at).num_seconds());
        if let Some(position) = position {
            self.end_location = Some(position.location.clone());
            self.end_progress = Some(position.book_progress);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.ended_at.is_some()
    }
}
