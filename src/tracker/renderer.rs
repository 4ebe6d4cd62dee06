//! Renderer collaborator
//!
//! The tracker reads the rendered tree, the viewport and node geometry from
//! the renderer, and asks it to scroll on restore. It never mutates the tree.

use serde::{Deserialize, Serialize};

use crate::location::{Rect, TextRange};
use crate::tree::DocumentTree;

/// Node handle type of a renderer's tree
pub type NodeOf<R> = <<R as Renderer>::Tree as DocumentTree>::Node;

/// Current page in paginated layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    /// 1-based page number
    pub number: u32,
    pub total: u32,
}

/// Visible region of the scroll container, in content coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub scroll_top: f64,
    pub scroll_left: f64,
    pub width: f64,
    pub height: f64,
    /// Total scrollable height of the chapter
    pub content_height: f64,
    pub page: Option<PageInfo>,
}

impl Viewport {
    pub fn top(&self) -> f64 {
        self.scroll_top
    }

    pub fn bottom(&self) -> f64 {
        self.scroll_top + self.height
    }

    pub fn left(&self) -> f64 {
        self.scroll_left
    }

    pub fn right(&self) -> f64 {
        self.scroll_left + self.width
    }

    pub fn center_y(&self) -> f64 {
        self.scroll_top + self.height / 2.0
    }

    /// Progress through the chapter, 0.0 to 1.0
    ///
    /// Paginated layouts use the page number; scrolled layouts use the scroll
    /// offset relative to the maximum scroll.
    pub fn chapter_progress(&self) -> f64 {
        if let Some(page) = self.page {
            if page.total <= 1 {
                return 0.0;
            }
            let done = page.number.saturating_sub(1) as f64;
            return (done / (page.total - 1) as f64).clamp(0.0, 1.0);
        }

        let max_scroll = self.content_height - self.height;
        if max_scroll <= 0.0 {
            return 0.0;
        }
        (self.scroll_top / max_scroll).clamp(0.0, 1.0)
    }
}

/// Where to place a node when scrolling to it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Start,
    Center,
    End,
}

/// Everything the tracker needs from the rendering layer
pub trait Renderer {
    type Tree: DocumentTree;

    /// Tree of the chapter currently on screen
    fn tree(&self) -> &Self::Tree;

    /// Index of the current chapter in reading order
    fn chapter_index(&self) -> usize;

    /// Number of chapters in the book
    fn chapter_count(&self) -> usize;

    fn viewport(&self) -> Viewport;

    /// Bounding box of a node in content coordinates
    fn bounding_rect(&self, node: <Self::Tree as DocumentTree>::Node) -> Option<Rect>;

    /// Scroll the container so `node` is visible at `align`
    fn scroll_to(&mut self, node: <Self::Tree as DocumentTree>::Node, align: Align);

    /// Current non-empty text selection, if any
    fn selection(&self) -> Option<TextRange<<Self::Tree as DocumentTree>::Node>> {
        None
    }
}

/// Progress through the book given chapter position and chapter progress
pub fn book_progress(chapter_index: usize, chapter_count: usize, chapter_progress: f64) -> f64 {
    if chapter_count == 0 {
        return 0.0;
    }
    ((chapter_index as f64 + chapter_progress) / chapter_count as f64).clamp(0.0, 1.0)
}
