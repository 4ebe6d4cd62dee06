//! Location Resolver
//!
//! Walks a tree along a Location's path. A Location that no longer maps onto
//! the tree is a stale bookmark, not an error: every function here returns
//! `None` in that case.

use super::types::*;
use super::{char_len, char_slice};
use crate::tree::{DocumentTree, NodeKind};

/// A Location resolved against a tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedLocation<N> {
    pub node: N,
    pub kind: NodeKind,
    /// Clamped character offset, for text targets only
    pub text_offset: Option<usize>,
}

/// Both ends of a RangeLocation resolved against a tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange<N> {
    pub start: ResolvedLocation<N>,
    pub end: ResolvedLocation<N>,
}

impl<N: Copy + Eq> ResolvedRange<N> {
    /// Convert to a live text range when both ends are text positions
    pub fn to_text_range(&self) -> Option<TextRange<N>> {
        Some(TextRange::new(
            self.start.node,
            self.start.text_offset?,
            self.end.node,
            self.end.text_offset?,
        ))
    }
}

/// Text around a resolved text position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSnippet {
    /// Full text of the target node
    pub text: String,
    /// Up to `context_length` characters preceding the offset
    pub before: String,
    /// Up to `context_length` characters starting at the offset
    pub after: String,
}

/// Resolve a Location against `tree`
///
/// Returns `None` for a foreign chapter, an empty path, or any index beyond
/// the current sibling count. Offsets past the end of the text are clamped to
/// its length.
pub fn resolve<T: DocumentTree>(location: &Location, tree: &T) -> Option<ResolvedLocation<T::Node>> {
    if location.chapter_id != tree.chapter_id() {
        tracing::debug!(
            location_chapter = %location.chapter_id,
            tree_chapter = %tree.chapter_id(),
            "Location belongs to another chapter"
        );
        return None;
    }
    if location.path.is_empty() {
        return None;
    }

    let mut current = tree.root();
    for (depth, segment) in location.path.iter().enumerate() {
        let kind: NodeKind = segment.kind.into();
        let siblings = tree.children(current, kind.into());
        match siblings.get(segment.index) {
            Some(&next) => current = next,
            None => {
                tracing::debug!(
                    location = %location,
                    depth = depth,
                    index = segment.index,
                    siblings = siblings.len(),
                    "Location path step out of range"
                );
                return None;
            }
        }
    }

    let kind = tree.kind(current);
    let text_offset = match kind {
        NodeKind::Text => {
            let length = char_len(&tree.text_of(current));
            Some(location.text_offset.unwrap_or(0).min(length))
        }
        // An offset on an element target carries no meaning
        NodeKind::Element => None,
    };

    Some(ResolvedLocation {
        node: current,
        kind,
        text_offset,
    })
}

/// Resolve both ends of a range independently
///
/// Inverted ranges are returned as-is.
pub fn resolve_range<T: DocumentTree>(
    range: &RangeLocation,
    tree: &T,
) -> Option<ResolvedRange<T::Node>> {
    let start = resolve(&range.start, tree)?;
    let end = resolve(&range.end, tree)?;
    Some(ResolvedRange { start, end })
}

/// Text surrounding a Location
///
/// Element targets use offset 0 into their descendant text.
pub fn text_content<T: DocumentTree>(
    location: &Location,
    tree: &T,
    context_length: usize,
) -> Option<TextSnippet> {
    let resolved = resolve(location, tree)?;
    let text = tree.text_of(resolved.node);
    let offset = resolved.text_offset.unwrap_or(0);

    Some(TextSnippet {
        before: char_slice(&text, offset.saturating_sub(context_length), offset),
        after: char_slice(&text, offset, offset.saturating_add(context_length)),
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{parse, Generator};
    use crate::tree::{ChapterTree, NodeId};

    fn sample_tree() -> (ChapterTree, NodeId) {
        let mut tree = ChapterTree::new("chapter-1");
        let root = tree.root();
        let p0 = tree.append_element(root, "p");
        tree.append_text(p0, "First paragraph.");
        let p1 = tree.append_element(root, "p");
        let text = tree.append_text(p1, "Hello world");
        (tree, text)
    }

    /// A chapter with mixed content at several depths
    fn nested_tree() -> ChapterTree {
        let mut tree = ChapterTree::new("chapter-3");
        let root = tree.root();
        tree.append_text(root, "\n");
        let section = tree.append_element(root, "section");
        let h1 = tree.append_element(section, "h1");
        tree.append_text(h1, "Title");
        tree.append_text(section, "\n  ");
        let p = tree.append_element(section, "p");
        tree.append_text(p, "Some ");
        let em = tree.append_element(p, "em");
        tree.append_text(em, "emphasis");
        tree.append_text(p, " and more.");
        let ul = tree.append_element(section, "ul");
        for item in ["one", "two", "three"] {
            let li = tree.append_element(ul, "li");
            tree.append_text(li, item);
        }
        tree.append_text(root, "\n");
        tree
    }

    #[test]
    fn test_concrete_scenario() {
        let (tree, text) = sample_tree();
        let location = Generator::new(&tree)
            .from_text_position(text, 6, "chapter-1")
            .unwrap();
        let encoded = location.to_string();
        assert_eq!(encoded, "doc:/chapter-1/1!/0:6");

        let resolved = resolve(&parse(&encoded).unwrap(), &tree).unwrap();
        assert_eq!(resolved.node, text);
        assert_eq!(resolved.kind, NodeKind::Text);
        assert_eq!(resolved.text_offset, Some(6));

        let snippet = text_content(&location, &tree, 5).unwrap();
        assert_eq!(snippet.text, "Hello world");
        assert_eq!(snippet.before, "ello ");
        assert_eq!(snippet.after, "world");
    }

    #[test]
    fn test_every_node_roundtrips() {
        let tree = nested_tree();
        let generator = Generator::new(&tree);

        for node in tree.descendants(tree.root()) {
            let location = generator.from_node(node, "chapter-3").unwrap();
            let reparsed = parse(&location.to_string()).unwrap();
            assert!(reparsed.same_address(&location));

            let resolved = resolve(&reparsed, &tree).unwrap();
            assert_eq!(resolved.node, node, "failed for {}", location);
        }
    }

    #[test]
    fn test_offset_clamped_after_edit() {
        let (mut tree, text) = sample_tree();
        let location = parse("doc:/chapter-1/1!/0:9").unwrap();

        tree.set_text(text, "Hello");
        let resolved = resolve(&location, &tree).unwrap();
        assert_eq!(resolved.text_offset, Some(5));
    }

    #[test]
    fn test_missing_offset_defaults_to_start() {
        let (tree, _) = sample_tree();
        let resolved = resolve(&parse("doc:/chapter-1/1!/0").unwrap(), &tree).unwrap();
        assert_eq!(resolved.text_offset, Some(0));
    }

    #[test]
    fn test_offset_ignored_on_element_target() {
        let (tree, _) = sample_tree();
        let resolved = resolve(&parse("doc:/chapter-1/1:4").unwrap(), &tree).unwrap();
        assert_eq!(resolved.kind, NodeKind::Element);
        assert_eq!(resolved.text_offset, None);
    }

    #[test]
    fn test_out_of_range_path() {
        let (tree, _) = sample_tree();
        assert!(resolve(&parse("doc:/chapter-1/2").unwrap(), &tree).is_none());
        assert!(resolve(&parse("doc:/chapter-1/1!/1").unwrap(), &tree).is_none());
        assert!(resolve(&parse("doc:/chapter-1/0/0").unwrap(), &tree).is_none());
    }

    #[test]
    fn test_foreign_chapter_and_empty_path() {
        let (tree, _) = sample_tree();
        assert!(resolve(&parse("doc:/chapter-2/1!/0:6").unwrap(), &tree).is_none());
        assert!(resolve(&parse("doc:/chapter-1").unwrap(), &tree).is_none());
    }

    #[test]
    fn test_resolve_range() {
        let (tree, text) = sample_tree();
        let generator = Generator::new(&tree);
        let range = generator
            .from_range(&TextRange::new(text, 0, text, 5), "chapter-1")
            .unwrap();

        let resolved = resolve_range(&range, &tree).unwrap();
        assert_eq!(resolved.to_text_range(), Some(TextRange::new(text, 0, text, 5)));

        let mut stale = range.clone();
        stale.end = parse("doc:/chapter-1/5!/0:1").unwrap();
        assert!(resolve_range(&stale, &tree).is_none());
    }

    #[test]
    fn test_resolve_range_keeps_inverted_order() {
        let (tree, text) = sample_tree();
        let generator = Generator::new(&tree);
        let range = generator
            .from_range(&TextRange::new(text, 8, text, 2), "chapter-1")
            .unwrap();

        let resolved = resolve_range(&range, &tree).unwrap();
        assert_eq!(resolved.start.text_offset, Some(8));
        assert_eq!(resolved.end.text_offset, Some(2));
    }

    #[test]
    fn test_text_content_clipped_at_node() {
        let (tree, _) = sample_tree();
        let location = parse("doc:/chapter-1/1!/0:2").unwrap();
        let snippet = text_content(&location, &tree, 50).unwrap();
        assert_eq!(snippet.before, "He");
        assert_eq!(snippet.after, "llo world");
    }

    #[test]
    fn test_text_content_with_unbounded_context() {
        let (tree, _) = sample_tree();
        let location = parse("doc:/chapter-1/1!/0:6").unwrap();
        let snippet = text_content(&location, &tree, usize::MAX).unwrap();
        assert_eq!(snippet.before, "Hello ");
        assert_eq!(snippet.after, "world");
    }
}
