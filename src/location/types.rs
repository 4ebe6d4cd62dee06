//! Location types
//!
//! A Location addresses a point inside one chapter's tree:
//! `doc:/<chapterId><path>[:<textOffset>]`, for example
//! `doc:/chapter-3/0/2!/1:15`.
//!
//! ```text
//! doc:/chapter-3/0/2!/1:15
//!      │        │ │  │  └── character offset 15
//!      │        │ │  └───── 2nd text child (text steps count text nodes only)
//!      │        │ └──────── 3rd element child
//!      │        └────────── 1st element child (element steps count elements only)
//!      └─────────────────── chapter id (percent-encoded)
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::tree::NodeKind;

/// Scheme prefix of the canonical string
pub const LOCATION_PREFIX: &str = "doc:/";

/// Kind of a path step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    /// Index among element children (`/n`)
    Element,
    /// Index among text children (`!/n`)
    Text,
}

impl From<SegmentKind> for NodeKind {
    fn from(kind: SegmentKind) -> Self {
        match kind {
            SegmentKind::Element => NodeKind::Element,
            SegmentKind::Text => NodeKind::Text,
        }
    }
}

/// One step in a root-to-target path
///
/// Debug metadata (tag, id, class) is captured at generation time for
/// diagnostics only. It is never serialized into the canonical string and is
/// ignored by equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathSegment {
    pub kind: SegmentKind,
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub class: Option<String>,
}

impl PathSegment {
    /// Create an element step
    pub fn element(index: usize) -> Self {
        Self {
            kind: SegmentKind::Element,
            index,
            tag: None,
            id: None,
            class: None,
        }
    }

    /// Create a text step
    pub fn text(index: usize) -> Self {
        Self {
            kind: SegmentKind::Text,
            index,
            tag: None,
            id: None,
            class: None,
        }
    }

    /// Attach debug metadata
    pub fn with_debug(
        mut self,
        tag: Option<String>,
        id: Option<String>,
        class: Option<String>,
    ) -> Self {
        self.tag = tag;
        self.id = id;
        self.class = class;
        self
    }

    /// Check if this is a text step
    pub fn is_text(&self) -> bool {
        self.kind == SegmentKind::Text
    }
}

impl PartialEq for PathSegment {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.index == other.index
    }
}

impl Eq for PathSegment {}

/// Canonical address of a point inside a chapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Chapter the path is relative to
    pub chapter_id: String,
    /// Root-to-target steps
    pub path: Vec<PathSegment>,
    /// Character offset inside the terminal text node
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub text_offset: Option<usize>,
    /// Fingerprint of the target's text, for drift detection
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub content_hash: Option<String>,
}

impl Location {
    /// Create a Location from a chapter id and path
    pub fn new(chapter_id: impl Into<String>, path: Vec<PathSegment>) -> Self {
        Self {
            chapter_id: chapter_id.into(),
            path,
            text_offset: None,
            content_hash: None,
        }
    }

    /// Set the character offset
    pub fn with_text_offset(mut self, offset: usize) -> Self {
        self.text_offset = Some(offset);
        self
    }

    /// Set the content fingerprint
    pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    /// Last step of the path
    pub fn target(&self) -> Option<&PathSegment> {
        self.path.last()
    }

    /// Check if this Location points into a text node
    pub fn is_text_position(&self) -> bool {
        self.target().map(PathSegment::is_text).unwrap_or(false)
    }

    /// Text offset, only when the path ends in a text step
    pub fn effective_text_offset(&self) -> Option<usize> {
        if self.is_text_position() {
            self.text_offset
        } else {
            None
        }
    }

    /// Compare the addressed point, ignoring fingerprint and debug metadata
    pub fn same_address(&self, other: &Location) -> bool {
        self.chapter_id == other.chapter_id
            && self.path == other.path
            && self.text_offset == other.text_offset
    }

    /// Path depth
    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

/// A selection between two Locations plus the text it covers
///
/// `start` must not come after `end` in document order; construction does not
/// check this (see `RangeLocation::is_ordered`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeLocation {
    pub start: Location,
    pub end: Location,
    pub selected_text: String,
    pub context_before: String,
    pub context_after: String,
    pub word_count: usize,
    pub char_count: usize,
}

impl RangeLocation {
    /// Check if both ends address the same point
    pub fn is_collapsed(&self) -> bool {
        self.start.same_address(&self.end)
    }
}

/// A live text range expressed in tree nodes
///
/// Both containers are expected to be text nodes; offsets are in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRange<N> {
    pub start: N,
    pub start_offset: usize,
    pub end: N,
    pub end_offset: usize,
}

impl<N: Copy + Eq> TextRange<N> {
    /// Create a range between two text positions
    pub fn new(start: N, start_offset: usize, end: N, end_offset: usize) -> Self {
        Self {
            start,
            start_offset,
            end,
            end_offset,
        }
    }

    /// Check if the range selects nothing
    pub fn is_collapsed(&self) -> bool {
        self.start == self.end && self.start_offset == self.end_offset
    }
}

/// Builder for constructing Locations step by step
#[derive(Debug, Clone)]
pub struct LocationBuilder {
    location: Location,
}

impl LocationBuilder {
    /// Start a Location in `chapter_id`
    pub fn new(chapter_id: impl Into<String>) -> Self {
        Self {
            location: Location::new(chapter_id, Vec::new()),
        }
    }

    /// Descend into the element child at `index`
    pub fn element(mut self, index: usize) -> Self {
        self.location.path.push(PathSegment::element(index));
        self
    }

    /// Descend into the text child at `index`
    pub fn text(mut self, index: usize) -> Self {
        self.location.path.push(PathSegment::text(index));
        self
    }

    /// Set the character offset
    pub fn offset(mut self, offset: usize) -> Self {
        self.location.text_offset = Some(offset);
        self
    }

    /// Set the content fingerprint
    pub fn content_hash(mut self, hash: impl Into<String>) -> Self {
        self.location.content_hash = Some(hash.into());
        self
    }

    /// Build the final Location
    pub fn build(self) -> Location {
        self.location
    }
}

// Display is the canonical serializer

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", LOCATION_PREFIX, urlencoding::encode(&self.chapter_id))?;
        for segment in &self.path {
            write!(f, "{}", segment)?;
        }
        if let Some(offset) = self.text_offset {
            write!(f, ":{}", offset)?;
        }
        Ok(())
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SegmentKind::Element => write!(f, "/{}", self.index),
            SegmentKind::Text => write!(f, "!/{}", self.index),
        }
    }
}

impl FromStr for Location {
    type Err = super::parser::LocationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        super::parser::parse(s)
    }
}

/// Serialize a Location to its canonical string
pub fn serialize(location: &Location) -> String {
    location.to_string()
}
