//! Location Generator
//!
//! Builds Locations from live positions: a node, a text position, a text
//! range, or a scroll offset.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::fingerprint::fingerprint;
use super::parser::LocationParseError;
use super::types::*;
use super::{char_len, char_slice};
use crate::tree::{DocumentTree, NodeKind};

/// Location generation errors
#[derive(Debug, Error, PartialEq)]
pub enum LocationError {
    #[error("Invalid location string: {0}")]
    Parse(#[from] LocationParseError),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("No block element starts near scroll offset {scroll_top}")]
    NoTarget { scroll_top: f64 },

    #[error("The chapter root is not addressable")]
    NotAddressable,

    #[error("Node is not attached to the chapter root")]
    Detached,

    #[error("Expected a text node")]
    NotText,

    #[error("Text offset {offset} is beyond text length {length}")]
    OffsetOutOfRange { offset: usize, length: usize },
}

/// Options controlling Location generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorOptions {
    /// Characters of context captured on each side of a range
    pub context_length: usize,
    /// Pixels above and below the scroll offset searched for a target
    pub scroll_tolerance: f64,
    /// Attach a content fingerprint to generated Locations
    pub fingerprint: bool,
    /// Record tag/id/class on each path step
    pub capture_debug: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            context_length: 50,
            scroll_tolerance: 50.0,
            fingerprint: true,
            capture_debug: true,
        }
    }
}

/// Bounding box of a node relative to its scroll container
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// Check whether the top edge lies in the vertical band `[from, to]`
    pub fn top_within(&self, from: f64, to: f64) -> bool {
        self.top() >= from && self.top() <= to
    }
}

/// Geometry accessor: where a node is laid out
pub trait Geometry<N> {
    fn bounding_rect(&self, node: N) -> Option<Rect>;
}

impl<N, F> Geometry<N> for F
where
    F: Fn(N) -> Option<Rect>,
{
    fn bounding_rect(&self, node: N) -> Option<Rect> {
        self(node)
    }
}

/// Generates Locations against one tree
pub struct Generator<'t, T: DocumentTree> {
    tree: &'t T,
    options: GeneratorOptions,
}

impl<'t, T: DocumentTree> Generator<'t, T> {
    /// Create a generator with default options
    pub fn new(tree: &'t T) -> Self {
        Self::with_options(tree, GeneratorOptions::default())
    }

    /// Create a generator with custom options
    pub fn with_options(tree: &'t T, options: GeneratorOptions) -> Self {
        Self { tree, options }
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    /// Address `node` relative to the chapter root
    ///
    /// Each step records the node's index among siblings of the same kind.
    pub fn from_node(&self, node: T::Node, chapter_id: &str) -> Result<Location, LocationError> {
        if node == self.tree.root() {
            return Err(LocationError::NotAddressable);
        }

        let path = self.path_to(node)?;
        let mut location = Location::new(chapter_id, path);
        self.attach_fingerprint(&mut location, node);
        Ok(location)
    }

    /// Address a character position inside a text node
    pub fn from_text_position(
        &self,
        text_node: T::Node,
        offset: usize,
        chapter_id: &str,
    ) -> Result<Location, LocationError> {
        if self.tree.kind(text_node) != NodeKind::Text {
            return Err(LocationError::NotText);
        }

        let length = char_len(&self.tree.text_of(text_node));
        if offset > length {
            return Err(LocationError::OffsetOutOfRange { offset, length });
        }

        // The parent's element path plus a trailing text step
        let path = self.path_to(text_node)?;
        let mut location = Location::new(chapter_id, path).with_text_offset(offset);
        self.attach_fingerprint(&mut location, text_node);
        Ok(location)
    }

    /// Address a text selection
    ///
    /// Both endpoints must sit in text nodes. Context windows are clipped at
    /// the endpoint's own text node.
    pub fn from_range(
        &self,
        range: &TextRange<T::Node>,
        chapter_id: &str,
    ) -> Result<RangeLocation, LocationError> {
        if self.tree.kind(range.start) != NodeKind::Text {
            return Err(LocationError::InvalidRange(
                "range start is not inside a text node".to_string(),
            ));
        }
        if self.tree.kind(range.end) != NodeKind::Text {
            return Err(LocationError::InvalidRange(
                "range end is not inside a text node".to_string(),
            ));
        }

        let start = self.from_text_position(range.start, range.start_offset, chapter_id)?;
        let end = self.from_text_position(range.end, range.end_offset, chapter_id)?;

        let selected_text = self.selected_text(range);
        let context_length = self.options.context_length;

        let start_text = self.tree.text_of(range.start);
        let context_before = char_slice(
            &start_text,
            range.start_offset.saturating_sub(context_length),
            range.start_offset,
        );

        let end_text = self.tree.text_of(range.end);
        let context_after = char_slice(
            &end_text,
            range.end_offset,
            range.end_offset.saturating_add(context_length),
        );

        Ok(RangeLocation {
            start,
            end,
            word_count: selected_text.split_whitespace().count(),
            char_count: char_len(&selected_text),
            selected_text,
            context_before,
            context_after,
        })
    }

    /// Address the block element nearest the top of the viewport
    ///
    /// Candidates are block elements whose top edge lies within
    /// `scroll_top ± scroll_tolerance`; the one whose top edge is closest to
    /// `scroll_top` wins, earlier nodes winning ties.
    pub fn from_scroll_offset<G>(
        &self,
        scroll_top: f64,
        chapter_id: &str,
        geometry: &G,
    ) -> Result<Location, LocationError>
    where
        G: Geometry<T::Node> + ?Sized,
    {
        let tolerance = self.options.scroll_tolerance;
        let from = scroll_top - tolerance;
        let to = scroll_top + tolerance;

        let mut best: Option<(T::Node, f64)> = None;
        for node in self.tree.descendants(self.tree.root()) {
            if !self.tree.is_block(node) {
                continue;
            }
            let Some(rect) = geometry.bounding_rect(node) else {
                continue;
            };
            if !rect.top_within(from, to) {
                continue;
            }

            let distance = (rect.top() - scroll_top).abs();
            match best {
                Some((_, best_distance)) if best_distance <= distance => {}
                _ => best = Some((node, distance)),
            }
        }

        let (node, distance) = best.ok_or(LocationError::NoTarget { scroll_top })?;
        tracing::debug!(
            scroll_top = scroll_top,
            distance = distance,
            target = ?node,
            "Resolved scroll offset to block element"
        );

        self.from_node(node, chapter_id)
    }

    /// Steps from the root down to `node`
    fn path_to(&self, node: T::Node) -> Result<Vec<PathSegment>, LocationError> {
        let root = self.tree.root();
        let mut segments = Vec::new();
        let mut current = node;

        while current != root {
            let parent = self.tree.parent(current).ok_or(LocationError::Detached)?;
            let kind = self.tree.kind(current);
            let index = self
                .tree
                .children(parent, kind.into())
                .iter()
                .position(|&sibling| sibling == current)
                .ok_or(LocationError::Detached)?;

            segments.push(self.segment(kind, index, current));
            current = parent;
        }

        segments.reverse();
        Ok(segments)
    }

    fn segment(&self, kind: NodeKind, index: usize, node: T::Node) -> PathSegment {
        let segment = match kind {
            NodeKind::Element => PathSegment::element(index),
            NodeKind::Text => PathSegment::text(index),
        };

        if !self.options.capture_debug || kind == NodeKind::Text {
            return segment;
        }

        segment.with_debug(
            self.tree.tag_name(node).map(str::to_string),
            self.tree.attribute(node, "id").map(str::to_string),
            self.tree.attribute(node, "class").map(str::to_string),
        )
    }

    fn attach_fingerprint(&self, location: &mut Location, node: T::Node) {
        if self.options.fingerprint {
            location.content_hash = Some(fingerprint(&self.tree.text_of(node)));
        }
    }

    /// Text covered by `range`, walking text nodes in document order
    fn selected_text(&self, range: &TextRange<T::Node>) -> String {
        if range.start == range.end {
            let text = self.tree.text_of(range.start);
            return char_slice(&text, range.start_offset, range.end_offset);
        }

        let text_nodes = self.tree.text_nodes(self.tree.root());
        let start_index = text_nodes.iter().position(|&n| n == range.start);
        let end_index = text_nodes.iter().position(|&n| n == range.end);

        let (Some(start_index), Some(end_index)) = (start_index, end_index) else {
            return String::new();
        };
        if start_index > end_index {
            return String::new();
        }

        let mut out = String::new();
        for (i, &node) in text_nodes[start_index..=end_index].iter().enumerate() {
            let text = self.tree.text_of(node);
            let index = start_index + i;
            if index == start_index {
                out.push_str(&char_slice(&text, range.start_offset, char_len(&text)));
            } else if index == end_index {
                out.push_str(&char_slice(&text, 0, range.end_offset));
            } else {
                out.push_str(&text);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{ChapterTree, NodeId};

    /// chapter-1 → [p0 "First paragraph.", p1 "Hello world"]
    fn sample_tree() -> (ChapterTree, NodeId, NodeId, NodeId) {
        let mut tree = ChapterTree::new("chapter-1");
        let root = tree.root();
        let p0 = tree.append_element(root, "p");
        tree.append_text(p0, "First paragraph.");
        let p1 = tree.append_element(root, "p");
        tree.set_attribute(p1, "id", "greeting");
        let text = tree.append_text(p1, "Hello world");
        (tree, p0, p1, text)
    }

    #[test]
    fn test_from_text_position_concrete() {
        let (tree, _, _, text) = sample_tree();
        let generator = Generator::new(&tree);

        let location = generator.from_text_position(text, 6, "chapter-1").unwrap();
        assert_eq!(location.to_string(), "doc:/chapter-1/1!/0:6");
        assert_eq!(location.content_hash, Some(fingerprint("Hello world")));
        assert_eq!(location.path[0].tag.as_deref(), Some("p"));
        assert_eq!(location.path[0].id.as_deref(), Some("greeting"));
    }

    #[test]
    fn test_from_node_counts_same_kind_siblings() {
        let mut tree = ChapterTree::new("c");
        let root = tree.root();
        tree.append_text(root, "\n");
        tree.append_element(root, "h1");
        tree.append_text(root, "\n");
        let p = tree.append_element(root, "p");
        tree.append_text(p, "a");
        let em = tree.append_element(p, "em");
        let b = tree.append_text(p, "b");

        let generator = Generator::new(&tree);
        assert_eq!(generator.from_node(p, "c").unwrap().to_string(), "doc:/c/1");
        assert_eq!(generator.from_node(em, "c").unwrap().to_string(), "doc:/c/1/0");
        assert_eq!(generator.from_node(b, "c").unwrap().to_string(), "doc:/c/1!/1");
    }

    #[test]
    fn test_from_node_root_not_addressable() {
        let (tree, _, _, _) = sample_tree();
        let generator = Generator::new(&tree);
        assert_eq!(
            generator.from_node(tree.root(), "chapter-1"),
            Err(LocationError::NotAddressable)
        );
    }

    #[test]
    fn test_fingerprint_can_be_disabled() {
        let (tree, p0, _, _) = sample_tree();
        let options = GeneratorOptions {
            fingerprint: false,
            capture_debug: false,
            ..Default::default()
        };
        let generator = Generator::with_options(&tree, options);

        let location = generator.from_node(p0, "chapter-1").unwrap();
        assert_eq!(location.content_hash, None);
        assert_eq!(location.path[0].tag, None);
    }

    #[test]
    fn test_from_text_position_rejects_elements_and_bad_offsets() {
        let (tree, p0, _, text) = sample_tree();
        let generator = Generator::new(&tree);

        assert_eq!(
            generator.from_text_position(p0, 0, "chapter-1"),
            Err(LocationError::NotText)
        );
        assert_eq!(
            generator.from_text_position(text, 12, "chapter-1"),
            Err(LocationError::OffsetOutOfRange {
                offset: 12,
                length: 11
            })
        );
        assert!(generator.from_text_position(text, 11, "chapter-1").is_ok());
    }

    #[test]
    fn test_from_range_single_node() {
        let (tree, _, _, text) = sample_tree();
        let options = GeneratorOptions {
            context_length: 3,
            ..Default::default()
        };
        let generator = Generator::with_options(&tree, options);

        let range = TextRange::new(text, 2, text, 7);
        let selection = generator.from_range(&range, "chapter-1").unwrap();

        assert_eq!(selection.start.to_string(), "doc:/chapter-1/1!/0:2");
        assert_eq!(selection.end.to_string(), "doc:/chapter-1/1!/0:7");
        assert_eq!(selection.selected_text, "llo w");
        assert_eq!(selection.context_before, "He");
        assert_eq!(selection.context_after, "orl");
        assert_eq!(selection.word_count, 2);
        assert_eq!(selection.char_count, 5);
    }

    #[test]
    fn test_from_range_across_nodes() {
        let (tree, p0, _, text) = sample_tree();
        let first = tree.text_nodes(p0)[0];
        let generator = Generator::new(&tree);

        let range = TextRange::new(first, 6, text, 5);
        let selection = generator.from_range(&range, "chapter-1").unwrap();

        assert_eq!(selection.selected_text, "paragraph.Hello");
        assert_eq!(selection.context_before, "First ");
        assert_eq!(selection.context_after, " world");
        assert!(!selection.is_collapsed());
    }

    #[test]
    fn test_from_range_requires_text_nodes() {
        let (tree, p0, _, text) = sample_tree();
        let generator = Generator::new(&tree);

        let range = TextRange::new(p0, 0, text, 3);
        assert!(matches!(
            generator.from_range(&range, "chapter-1"),
            Err(LocationError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_from_scroll_offset() {
        let (tree, p0, p1, _) = sample_tree();
        let generator = Generator::new(&tree);

        let geometry = |node: NodeId| {
            if node == p0 {
                Some(Rect::new(0.0, 0.0, 600.0, 400.0))
            } else if node == p1 {
                Some(Rect::new(0.0, 400.0, 600.0, 300.0))
            } else {
                None
            }
        };

        let top = generator.from_scroll_offset(10.0, "chapter-1", &geometry).unwrap();
        assert_eq!(top.to_string(), "doc:/chapter-1/0");

        let second = generator.from_scroll_offset(380.0, "chapter-1", &geometry).unwrap();
        assert_eq!(second.to_string(), "doc:/chapter-1/1");

        assert_eq!(
            generator.from_scroll_offset(2000.0, "chapter-1", &geometry),
            Err(LocationError::NoTarget { scroll_top: 2000.0 })
        );
    }

    #[test]
    fn test_from_scroll_offset_ignores_block_spanning_band() {
        let (tree, p0, _, _) = sample_tree();
        let generator = Generator::new(&tree);

        // p0 covers 0..400 but its top is far above 200 ± 50
        let geometry = |node: NodeId| (node == p0).then(|| Rect::new(0.0, 0.0, 600.0, 400.0));

        assert_eq!(
            generator.from_scroll_offset(200.0, "chapter-1", &geometry),
            Err(LocationError::NoTarget { scroll_top: 200.0 })
        );
        assert!(generator.from_scroll_offset(40.0, "chapter-1", &geometry).is_ok());
    }

    #[test]
    fn test_from_range_with_unbounded_context() {
        let (tree, _, _, text) = sample_tree();
        let options = GeneratorOptions {
            context_length: usize::MAX,
            ..Default::default()
        };
        let generator = Generator::with_options(&tree, options);

        let range = TextRange::new(text, 0, text, 5);
        let selection = generator.from_range(&range, "chapter-1").unwrap();
        assert_eq!(selection.context_before, "");
        assert_eq!(selection.context_after, " world");
    }
}
