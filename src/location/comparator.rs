//! Location Comparison and Ordering
//!
//! Element and text steps index separate sibling lists, so two paths cannot
//! be ordered by their indices alone. Comparison resolves both Locations and
//! orders them by the position of their targets in the tree.

use std::cmp::Ordering;

use super::resolver::resolve;
use super::types::*;
use crate::tree::{DocumentTree, NodeFilter};

/// Document-order key: child positions among all children, then the offset
fn order_key<T: DocumentTree>(location: &Location, tree: &T) -> Option<(Vec<usize>, usize)> {
    let resolved = resolve(location, tree)?;

    let mut positions = Vec::new();
    let mut current = resolved.node;
    while let Some(parent) = tree.parent(current) {
        let position = tree
            .children(parent, NodeFilter::All)
            .iter()
            .position(|&child| child == current)?;
        positions.push(position);
        current = parent;
    }
    positions.reverse();

    Some((positions, resolved.text_offset.unwrap_or(0)))
}

/// Compare two Locations in document order
///
/// Returns `None` if either Location does not resolve against `tree`.
/// An ancestor sorts before its descendants.
pub fn compare<T: DocumentTree>(a: &Location, b: &Location, tree: &T) -> Option<Ordering> {
    let key_a = order_key(a, tree)?;
    let key_b = order_key(b, tree)?;
    Some(key_a.cmp(&key_b))
}

/// Determine if `a` comes before `b` in reading order
pub fn is_before<T: DocumentTree>(a: &Location, b: &Location, tree: &T) -> bool {
    compare(a, b, tree) == Some(Ordering::Less)
}

/// Determine if `a` comes after `b` in reading order
pub fn is_after<T: DocumentTree>(a: &Location, b: &Location, tree: &T) -> bool {
    compare(a, b, tree) == Some(Ordering::Greater)
}

/// Check if `location` falls within `range`, ends included
pub fn is_in_range<T: DocumentTree>(location: &Location, range: &RangeLocation, tree: &T) -> bool {
    matches!(
        compare(&range.start, location, tree),
        Some(Ordering::Less | Ordering::Equal)
    ) && matches!(
        compare(location, &range.end, tree),
        Some(Ordering::Less | Ordering::Equal)
    )
}

/// Compare two Location strings
/// Returns None if either string is invalid or does not resolve
pub fn compare_strings<T: DocumentTree>(a: &str, b: &str, tree: &T) -> Option<Ordering> {
    let a = super::parser::parse(a).ok()?;
    let b = super::parser::parse(b).ok()?;
    compare(&a, &b, tree)
}

impl RangeLocation {
    /// Check that `start` does not come after `end`
    pub fn is_ordered<T: DocumentTree>(&self, tree: &T) -> bool {
        matches!(
            compare(&self.start, &self.end, tree),
            Some(Ordering::Less | Ordering::Equal)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{parse, Generator};
    use crate::tree::{ChapterTree, NodeId};

    /// body → [p "Intro ", <em>"bold"</em>, " tail"], [p "Second"]
    fn sample_tree() -> (ChapterTree, NodeId, NodeId, NodeId) {
        let mut tree = ChapterTree::new("c");
        let root = tree.root();
        let p0 = tree.append_element(root, "p");
        let intro = tree.append_text(p0, "Intro ");
        let em = tree.append_element(p0, "em");
        tree.append_text(em, "bold");
        let tail = tree.append_text(p0, " tail");
        let p1 = tree.append_element(root, "p");
        tree.append_text(p1, "Second");
        (tree, intro, em, tail)
    }

    fn loc(s: &str) -> Location {
        parse(s).unwrap()
    }

    #[test]
    fn test_text_offsets_ordered() {
        let (tree, _, _, _) = sample_tree();
        assert!(is_before(&loc("doc:/c/0!/0:1"), &loc("doc:/c/0!/0:4"), &tree));
        assert!(is_after(&loc("doc:/c/0!/0:4"), &loc("doc:/c/0!/0:1"), &tree));
    }

    #[test]
    fn test_mixed_kinds_use_tree_order() {
        let (tree, _, _, _) = sample_tree();
        // Element 0 of p0 (<em>) sits between text 0 and text 1
        let em = loc("doc:/c/0/0");
        let intro = loc("doc:/c/0!/0:5");
        let tail = loc("doc:/c/0!/1:0");

        assert!(is_before(&intro, &em, &tree));
        assert!(is_before(&em, &tail, &tree));
    }

    #[test]
    fn test_ancestor_first_and_chapters_order() {
        let (tree, _, _, _) = sample_tree();
        assert!(is_before(&loc("doc:/c/0"), &loc("doc:/c/0!/0:0"), &tree));
        assert!(is_before(&loc("doc:/c/0!/1:3"), &loc("doc:/c/1"), &tree));
        assert_eq!(
            compare(&loc("doc:/c/1"), &loc("doc:/c/1"), &tree),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn test_unresolvable_has_no_order() {
        let (tree, _, _, _) = sample_tree();
        assert_eq!(compare(&loc("doc:/c/9"), &loc("doc:/c/0"), &tree), None);
        assert!(!is_before(&loc("doc:/other/0"), &loc("doc:/c/0"), &tree));
        assert_eq!(compare_strings("nope", "doc:/c/0", &tree), None);
        assert_eq!(
            compare_strings("doc:/c/0", "doc:/c/1", &tree),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn test_range_membership_and_ordering() {
        let (tree, intro, _, tail) = sample_tree();
        let generator = Generator::new(&tree);
        let range = generator
            .from_range(&TextRange::new(intro, 2, tail, 3), "c")
            .unwrap();

        assert!(range.is_ordered(&tree));
        assert_eq!(range.selected_text, "tro bold ta");
        assert!(is_in_range(&loc("doc:/c/0/0"), &range, &tree));
        assert!(is_in_range(&loc("doc:/c/0!/0:2"), &range, &tree));
        assert!(!is_in_range(&loc("doc:/c/0!/0:1"), &range, &tree));
        assert!(!is_in_range(&loc("doc:/c/1"), &range, &tree));

        let inverted = generator
            .from_range(&TextRange::new(tail, 3, intro, 2), "c")
            .unwrap();
        assert!(!inverted.is_ordered(&tree));
    }
}
