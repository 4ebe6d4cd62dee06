//! In-memory chapter tree
//!
//! Arena-backed tree used for server-side resolution, tests and the CLI.

use serde::{Deserialize, Serialize};

use super::{DocumentTree, NodeFilter, NodeKind};

/// Handle to a node inside a [`ChapterTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    /// Raw arena index
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    tag: Option<String>,
    attributes: Vec<(String, String)>,
    text: String,
}

/// A chapter's node tree
#[derive(Debug, Clone)]
pub struct ChapterTree {
    chapter_id: String,
    nodes: Vec<NodeData>,
}

impl ChapterTree {
    /// Create a tree whose root is a `<body>` element
    pub fn new(chapter_id: impl Into<String>) -> Self {
        Self::with_root(chapter_id, "body")
    }

    /// Create a tree with a custom root tag
    pub fn with_root(chapter_id: impl Into<String>, root_tag: &str) -> Self {
        Self {
            chapter_id: chapter_id.into(),
            nodes: vec![NodeData {
                kind: NodeKind::Element,
                parent: None,
                children: Vec::new(),
                tag: Some(root_tag.to_ascii_lowercase()),
                attributes: Vec::new(),
                text: String::new(),
            }],
        }
    }

    /// Number of nodes, root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A tree always holds its root, so it is never empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Append an element child to `parent`
    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        self.push(
            parent,
            NodeData {
                kind: NodeKind::Element,
                parent: Some(parent),
                children: Vec::new(),
                tag: Some(tag.to_ascii_lowercase()),
                attributes: Vec::new(),
                text: String::new(),
            },
        )
    }

    /// Append a text child to `parent`
    pub fn append_text(&mut self, parent: NodeId, text: impl Into<String>) -> NodeId {
        self.push(
            parent,
            NodeData {
                kind: NodeKind::Text,
                parent: Some(parent),
                children: Vec::new(),
                tag: None,
                attributes: Vec::new(),
                text: text.into(),
            },
        )
    }

    /// Set (or replace) an attribute on an element
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: impl Into<String>) {
        let Some(data) = self.nodes.get_mut(node.0) else {
            return;
        };
        let attributes = &mut data.attributes;
        let value = value.into();
        match attributes.iter_mut().find(|(k, _)| k == name) {
            Some(existing) => existing.1 = value,
            None => attributes.push((name.to_string(), value)),
        }
    }

    /// Replace the content of a text node
    pub fn set_text(&mut self, node: NodeId, text: impl Into<String>) {
        if let Some(data) = self.nodes.get_mut(node.0) {
            if data.kind == NodeKind::Text {
                data.text = text.into();
            }
        }
    }

    /// Unknown parents leave the new node detached
    fn push(&mut self, parent: NodeId, mut data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        match self.nodes.get_mut(parent.0) {
            Some(parent) => parent.children.push(id),
            None => data.parent = None,
        }
        self.nodes.push(data);
        id
    }
}

impl DocumentTree for ChapterTree {
    type Node = NodeId;

    fn chapter_id(&self) -> &str {
        &self.chapter_id
    }

    fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId, filter: NodeFilter) -> Vec<NodeId> {
        match self.nodes.get(node.0) {
            Some(data) => data
                .children
                .iter()
                .copied()
                .filter(|c| filter.accepts(self.nodes[c.0].kind))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Ids from another tree read as empty elements
    fn kind(&self, node: NodeId) -> NodeKind {
        self.nodes
            .get(node.0)
            .map(|n| n.kind)
            .unwrap_or(NodeKind::Element)
    }

    fn text_of(&self, node: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![node];

        while let Some(next) = stack.pop() {
            let Some(data) = self.nodes.get(next.0) else {
                continue;
            };
            match data.kind {
                NodeKind::Text => out.push_str(&data.text),
                NodeKind::Element => stack.extend(data.children.iter().rev().copied()),
            }
        }

        out
    }

    fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node.0).and_then(|n| n.tag.as_deref())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes.get(node.0).and_then(|n| {
            n.attributes
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_by_kind() {
        let mut tree = ChapterTree::new("chapter-1");
        let root = tree.root();
        let t0 = tree.append_text(root, "\n");
        let p0 = tree.append_element(root, "P");
        let t1 = tree.append_text(root, "\n");
        let p1 = tree.append_element(root, "p");

        assert_eq!(tree.children(root, NodeFilter::Elements), vec![p0, p1]);
        assert_eq!(tree.children(root, NodeFilter::Texts), vec![t0, t1]);
        assert_eq!(tree.children(root, NodeFilter::All), vec![t0, p0, t1, p1]);
        assert_eq!(tree.tag_name(p0), Some("p"));
        assert_eq!(tree.parent(p1), Some(root));
        assert_eq!(tree.parent(root), None);
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn test_attributes_and_text_edits() {
        let mut tree = ChapterTree::new("chapter-1");
        let root = tree.root();
        let p = tree.append_element(root, "p");
        let text = tree.append_text(p, "Hello world");

        tree.set_attribute(p, "id", "intro");
        tree.set_attribute(p, "id", "opening");
        assert_eq!(tree.attribute(p, "id"), Some("opening"));
        assert_eq!(tree.attribute(p, "class"), None);

        tree.set_text(text, "Hello");
        assert_eq!(tree.text_of(p), "Hello");

        // Elements have no own text to replace
        tree.set_text(p, "ignored");
        assert_eq!(tree.text_of(p), "Hello");
    }

    #[test]
    fn test_foreign_node_ids() {
        let mut small = ChapterTree::new("a");
        let mut large = ChapterTree::new("b");
        let root = large.root();
        let p = large.append_element(root, "p");
        let text = large.append_text(p, "only in b");

        assert_eq!(small.kind(text), NodeKind::Element);
        assert_eq!(small.text_of(text), "");
        assert_eq!(small.parent(text), None);
        assert!(small.children(p, NodeFilter::All).is_empty());

        small.set_attribute(p, "id", "x");
        small.set_text(text, "x");
        assert_eq!(small.len(), 1);

        let orphan = small.append_element(p, "p");
        assert_eq!(small.parent(orphan), None);
        assert!(small.children(small.root(), NodeFilter::All).is_empty());
    }

    #[test]
    fn test_text_of_deep_nesting() {
        let mut tree = ChapterTree::new("chapter-1");
        let mut parent = tree.root();
        for _ in 0..200_000 {
            parent = tree.append_element(parent, "span");
        }
        tree.append_text(parent, "deep");
        tree.append_text(tree.root(), " shallow");

        assert_eq!(tree.text_of(tree.root()), "deep shallow");
    }
}
