//! Document tree capability
//!
//! The addressing code never talks to a concrete DOM. Anything that can list
//! ordered element/text children, walk to a parent and read text can be
//! addressed: a browser DOM bridge, a virtual DOM, or the in-memory
//! [`ChapterTree`] built from chapter XHTML.

mod arena;
pub mod xhtml;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use arena::{ChapterTree, NodeId};

/// Tags treated as addressable block nodes
///
/// These are the candidates for scroll-offset and most-visible-node lookups.
pub const BLOCK_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "blockquote", "pre", "figure", "figcaption",
    "dd", "dt", "td", "th", "section", "article", "aside", "header", "footer", "div", "table",
    "ul", "ol", "dl", "hr", "img",
];

/// Kind of a tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Element,
    Text,
}

/// Which children to list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeFilter {
    /// Element children only
    Elements,
    /// Text children only
    Texts,
    /// Every child, in document order
    All,
}

impl NodeFilter {
    /// Check whether a node of `kind` passes this filter
    pub fn accepts(self, kind: NodeKind) -> bool {
        match self {
            NodeFilter::Elements => kind == NodeKind::Element,
            NodeFilter::Texts => kind == NodeKind::Text,
            NodeFilter::All => true,
        }
    }
}

impl From<NodeKind> for NodeFilter {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Element => NodeFilter::Elements,
            NodeKind::Text => NodeFilter::Texts,
        }
    }
}

/// Read-only access to one chapter's node tree
pub trait DocumentTree {
    /// Node handle. Handles are cheap copies and compare by identity.
    type Node: Copy + Eq + fmt::Debug;

    /// Identifier of the chapter this tree renders
    fn chapter_id(&self) -> &str;

    /// The chapter root (paths are relative to it)
    fn root(&self) -> Self::Node;

    /// Parent of `node`, `None` for the root
    fn parent(&self, node: Self::Node) -> Option<Self::Node>;

    /// Ordered children of `node` passing `filter`
    fn children(&self, node: Self::Node, filter: NodeFilter) -> Vec<Self::Node>;

    /// Kind of `node`
    fn kind(&self, node: Self::Node) -> NodeKind;

    /// Text of a text node, or the concatenated descendant text of an element
    fn text_of(&self, node: Self::Node) -> String;

    /// Lowercase tag name of an element
    fn tag_name(&self, node: Self::Node) -> Option<&str>;

    /// Attribute value of an element
    fn attribute(&self, node: Self::Node, name: &str) -> Option<&str>;

    /// Check whether `node` is an addressable block element
    fn is_block(&self, node: Self::Node) -> bool {
        self.tag_name(node)
            .map(|tag| BLOCK_TAGS.contains(&tag))
            .unwrap_or(false)
    }

    /// All descendants of `node` in document (pre-)order, excluding `node`
    fn descendants(&self, node: Self::Node) -> Vec<Self::Node> {
        let mut out = Vec::new();
        let mut stack: Vec<Self::Node> = self.children(node, NodeFilter::All);
        stack.reverse();

        while let Some(next) = stack.pop() {
            out.push(next);
            let mut kids = self.children(next, NodeFilter::All);
            kids.reverse();
            stack.extend(kids);
        }

        out
    }

    /// Text nodes under `node` in document order
    fn text_nodes(&self, node: Self::Node) -> Vec<Self::Node> {
        self.descendants(node)
            .into_iter()
            .filter(|&n| self.kind(n) == NodeKind::Text)
            .collect()
    }
}
