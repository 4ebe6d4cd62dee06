//! Chapter XHTML loader
//!
//! Builds a [`ChapterTree`] from a chapter's XHTML using quick-xml. The tree is
//! rooted at `<body>` (or the document element when there is no body), and
//! whitespace-only text nodes are kept so text indices line up with what a
//! browser DOM would report for the same markup.

use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

use super::{ChapterTree, DocumentTree, NodeId};

/// Chapter markup errors
#[derive(Debug, Error)]
pub enum XhtmlError {
    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid UTF-8 in markup at position {0}")]
    InvalidUtf8(usize),

    #[error("Chapter has no root element")]
    NoRootElement,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Intermediate node collected while streaming the markup
#[derive(Debug, Default)]
struct RawNode {
    tag: Option<String>,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<RawNode>,
}

impl RawNode {
    fn element(tag: String, attributes: Vec<(String, String)>) -> Self {
        Self {
            tag: Some(tag),
            attributes,
            ..Default::default()
        }
    }

    fn text(text: String) -> Self {
        Self {
            text,
            ..Default::default()
        }
    }

    fn find_element(&self, name: &str) -> Option<&RawNode> {
        if self.tag.as_deref() == Some(name) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_element(name))
    }
}

/// Named entities commonly found in EPUB chapters that XML does not predefine
fn resolve_html_entity(name: &str) -> Option<&'static str> {
    match name {
        "nbsp" => Some("\u{a0}"),
        "shy" => Some("\u{ad}"),
        "ensp" => Some("\u{2002}"),
        "emsp" => Some("\u{2003}"),
        "thinsp" => Some("\u{2009}"),
        "ndash" => Some("\u{2013}"),
        "mdash" => Some("\u{2014}"),
        "lsquo" => Some("\u{2018}"),
        "rsquo" => Some("\u{2019}"),
        "ldquo" => Some("\u{201c}"),
        "rdquo" => Some("\u{201d}"),
        "hellip" => Some("\u{2026}"),
        "copy" => Some("\u{a9}"),
        "laquo" => Some("\u{ab}"),
        "raquo" => Some("\u{bb}"),
        _ => None,
    }
}

/// Parse chapter markup into a [`ChapterTree`]
pub fn parse_chapter(chapter_id: &str, markup: &str) -> Result<ChapterTree, XhtmlError> {
    let mut reader = Reader::from_str(markup);
    reader.expand_empty_elements(true);
    reader.check_end_names(false);

    // Synthetic document node; its element children are the top-level elements
    let mut stack: Vec<RawNode> = vec![RawNode::default()];
    // Only consecutive text events form one DOM text node
    let mut after_text = false;

    loop {
        let event = reader.read_event()?;
        let is_text = matches!(event, Event::Text(_) | Event::CData(_));

        match event {
            Event::Start(start) => {
                let tag = std::str::from_utf8(start.local_name().as_ref())
                    .map_err(|_| XhtmlError::InvalidUtf8(reader.buffer_position()))?
                    .to_ascii_lowercase();

                let mut attributes = Vec::new();
                for attr in start.attributes() {
                    let attr = attr.map_err(quick_xml::Error::from)?;
                    let key = std::str::from_utf8(attr.key.local_name().as_ref())
                        .map_err(|_| XhtmlError::InvalidUtf8(reader.buffer_position()))?
                        .to_string();
                    let value = attr.unescape_value()?.into_owned();
                    attributes.push((key, value));
                }

                stack.push(RawNode::element(tag, attributes));
            }
            Event::End(_) => {
                // Stray end tags at document level are ignored
                if stack.len() > 1 {
                    if let Some(node) = stack.pop() {
                        if let Some(parent) = stack.last_mut() {
                            parent.children.push(node);
                        }
                    }
                }
            }
            Event::Text(text) => {
                let content = text.unescape_with(resolve_html_entity)?.into_owned();
                push_text(&mut stack, content, after_text);
            }
            Event::CData(cdata) => {
                let content = String::from_utf8_lossy(&cdata.into_inner()).into_owned();
                push_text(&mut stack, content, after_text);
            }
            Event::Eof => break,
            // Comments, declarations, processing instructions and doctypes are not addressable
            _ => {}
        }

        after_text = is_text;
    }

    // Close anything left open by truncated markup
    while stack.len() > 1 {
        if let Some(node) = stack.pop() {
            if let Some(parent) = stack.last_mut() {
                parent.children.push(node);
            }
        }
    }

    let document = stack.pop().ok_or(XhtmlError::NoRootElement)?;
    let root = document
        .find_element("body")
        .or_else(|| document.children.iter().find(|c| c.tag.is_some()))
        .ok_or(XhtmlError::NoRootElement)?;

    let root_tag = root.tag.as_deref().unwrap_or("body");
    let mut tree = ChapterTree::with_root(chapter_id, root_tag);
    let tree_root = tree.root();
    for (key, value) in &root.attributes {
        tree.set_attribute(tree_root, key, value.clone());
    }
    for child in &root.children {
        copy_into(&mut tree, tree_root, child);
    }

    tracing::debug!(
        chapter_id = %chapter_id,
        nodes = tree.len(),
        "Parsed chapter markup"
    );

    Ok(tree)
}

/// Read and parse a chapter file
pub fn load_chapter(chapter_id: &str, path: impl AsRef<Path>) -> Result<ChapterTree, XhtmlError> {
    let markup = std::fs::read_to_string(path)?;
    parse_chapter(chapter_id, &markup)
}

fn push_text(stack: &mut [RawNode], content: String, merge: bool) {
    // Text outside the document element is never addressable
    if stack.len() <= 1 || content.is_empty() {
        return;
    }
    if let Some(parent) = stack.last_mut() {
        // quick-xml may split a run of text around entities; keep one DOM text node
        match parent.children.last_mut() {
            Some(last) if merge && last.tag.is_none() => last.text.push_str(&content),
            _ => parent.children.push(RawNode::text(content)),
        }
    }
}

fn copy_into(tree: &mut ChapterTree, parent: NodeId, node: &RawNode) {
    match &node.tag {
        Some(tag) => {
            let id = tree.append_element(parent, tag);
            for (key, value) in &node.attributes {
                tree.set_attribute(id, key, value.clone());
            }
            for child in &node.children {
                copy_into(tree, id, child);
            }
        }
        None => {
            tree.append_text(parent, node.text.clone());
        }
    }
}
