//! Current-position strategies
//!
//! When there is no explicit cursor, the tracker asks a [`LocateStrategy`]
//! which block node best represents what the reader is looking at.

use crate::location::{Geometry, Rect};
use crate::tree::DocumentTree;

use super::renderer::Viewport;

/// Picks the node that stands for the current reading position
pub trait LocateStrategy<T: DocumentTree> {
    fn name(&self) -> &'static str;

    fn locate(&self, tree: &T, viewport: &Viewport, geometry: &dyn Geometry<T::Node>) -> Option<T::Node>;
}

/// Weighted visibility and centrality score (scrolled layouts)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MostVisible {
    pub visibility_weight: f64,
    pub centrality_weight: f64,
}

impl Default for MostVisible {
    fn default() -> Self {
        Self {
            visibility_weight: 0.7,
            centrality_weight: 0.3,
        }
    }
}

impl MostVisible {
    /// Score a candidate box, `None` if it is not on screen
    ///
    /// `visibility_weight · visibleFraction + centrality_weight · centrality`,
    /// where centrality is 1 at the viewport center and 0 at its edges.
    pub fn score_candidate(&self, rect: &Rect, viewport: &Viewport) -> Option<f64> {
        if rect.height <= 0.0 || viewport.height <= 0.0 {
            return None;
        }

        let visible = rect.bottom().min(viewport.bottom()) - rect.top().max(viewport.top());
        if visible <= 0.0 {
            return None;
        }
        let visible_fraction = (visible / rect.height).min(1.0);

        let half_height = viewport.height / 2.0;
        let distance = (rect.center_y() - viewport.center_y()).abs();
        let centrality = 1.0 - (distance / half_height).min(1.0);

        Some(self.visibility_weight * visible_fraction + self.centrality_weight * centrality)
    }
}

impl<T: DocumentTree> LocateStrategy<T> for MostVisible {
    fn name(&self) -> &'static str {
        "most-visible"
    }

    fn locate(&self, tree: &T, viewport: &Viewport, geometry: &dyn Geometry<T::Node>) -> Option<T::Node> {
        let mut best: Option<(T::Node, f64)> = None;

        for node in tree.descendants(tree.root()) {
            if !tree.is_block(node) {
                continue;
            }
            let Some(rect) = geometry.bounding_rect(node) else {
                continue;
            };
            let Some(score) = self.score_candidate(&rect, viewport) else {
                continue;
            };

            // Earlier nodes win ties
            match best {
                Some((_, best_score)) if best_score >= score => {}
                _ => best = Some((node, score)),
            }
        }

        best.map(|(node, score)| {
            tracing::trace!(node = ?node, score = score, "Most visible block");
            node
        })
    }
}

/// First block on screen in document order (paginated layouts)
///
/// Column layouts place pages side by side, so both axes are checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FirstVisible;

impl<T: DocumentTree> LocateStrategy<T> for FirstVisible {
    fn name(&self) -> &'static str {
        "first-visible"
    }

    fn locate(&self, tree: &T, viewport: &Viewport, geometry: &dyn Geometry<T::Node>) -> Option<T::Node> {
        tree.descendants(tree.root()).into_iter().find(|&node| {
            if !tree.is_block(node) {
                return false;
            }
            geometry
                .bounding_rect(node)
                .map(|rect| {
                    rect.top() < viewport.bottom()
                        && rect.bottom() > viewport.top()
                        && rect.left() < viewport.right()
                        && rect.right() > viewport.left()
                })
                .unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{ChapterTree, NodeId};

    fn viewport(scroll_top: f64, scroll_left: f64) -> Viewport {
        Viewport {
            scroll_top,
            scroll_left,
            width: 600.0,
            height: 300.0,
            content_height: 2000.0,
            page: None,
        }
    }

    /// Ten stacked 100px paragraphs
    fn stacked() -> (ChapterTree, Vec<NodeId>) {
        let mut tree = ChapterTree::new("c");
        let root = tree.root();
        let paragraphs = (0..10)
            .map(|i| {
                let p = tree.append_element(root, "p");
                tree.append_text(p, format!("Paragraph {}", i));
                p
            })
            .collect();
        (tree, paragraphs)
    }

    #[test]
    fn test_score_candidate() {
        let strategy = MostVisible::default();
        let vp = viewport(0.0, 0.0);

        // Fully visible and centered
        let centered = Rect::new(0.0, 100.0, 600.0, 100.0);
        let score = strategy.score_candidate(&centered, &vp).unwrap();
        assert!((score - 1.0).abs() < 1e-9);

        // Half visible, center at the top edge
        let clipped = Rect::new(0.0, -50.0, 600.0, 100.0);
        let score = strategy.score_candidate(&clipped, &vp).unwrap();
        assert!((score - 0.35).abs() < 1e-9);

        let offscreen = Rect::new(0.0, 400.0, 600.0, 100.0);
        assert_eq!(strategy.score_candidate(&offscreen, &vp), None);
    }

    #[test]
    fn test_most_visible_prefers_center() {
        let (tree, paragraphs) = stacked();
        let geometry = |node: NodeId| {
            paragraphs
                .iter()
                .position(|&p| p == node)
                .map(|i| Rect::new(0.0, i as f64 * 100.0, 600.0, 100.0))
        };

        let found = MostVisible::default().locate(&tree, &viewport(500.0, 0.0), &geometry);
        assert_eq!(found, Some(paragraphs[6]));

        // p1 and p2 tie; the earlier one wins
        let found = MostVisible::default().locate(&tree, &viewport(50.0, 0.0), &geometry);
        assert_eq!(found, Some(paragraphs[1]));
    }

    #[test]
    fn test_first_visible_uses_columns() {
        let (tree, paragraphs) = stacked();
        // Two columns of five paragraphs, 600px wide each
        let geometry = |node: NodeId| {
            paragraphs.iter().position(|&p| p == node).map(|i| {
                let column = (i / 5) as f64;
                let row = (i % 5) as f64;
                Rect::new(column * 600.0, row * 60.0, 600.0, 60.0)
            })
        };

        let first_page = FirstVisible.locate(&tree, &viewport(0.0, 0.0), &geometry);
        assert_eq!(first_page, Some(paragraphs[0]));

        let second_page = FirstVisible.locate(&tree, &viewport(0.0, 600.0), &geometry);
        assert_eq!(second_page, Some(paragraphs[5]));

        let past_end = FirstVisible.locate(&tree, &viewport(0.0, 1200.0), &geometry);
        assert_eq!(past_end, None);
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!(
            <MostVisible as LocateStrategy<ChapterTree>>::name(&MostVisible::default()),
            "most-visible"
        );
        assert_eq!(
            <FirstVisible as LocateStrategy<ChapterTree>>::name(&FirstVisible),
            "first-visible"
        );
    }
}
