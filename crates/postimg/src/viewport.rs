//! Viewport Tracking
//!
//! Vertical viewport bounds and element visibility tests.

use std::cell::Cell;
use std::rc::Rc;

/// Element position in document coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ElementGeometry {
    pub top: f64,
    pub height: f64,
}

impl ElementGeometry {
    pub fn new(top: f64, height: f64) -> Self {
        Self { top, height }
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Anything with a document-space position
pub trait Positioned {
    fn geometry(&self) -> ElementGeometry;
}

/// Source of scroll offset and viewport height
pub trait ViewportSource {
    fn scroll_top(&self) -> f64;
    fn viewport_height(&self) -> f64;
}

/// Viewport bounds in document coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewportBounds {
    pub top: f64,
    pub bottom: f64,
}

impl ViewportBounds {
    /// Bounds for a scroll offset and height; negative heights clamp to zero
    pub fn new(scroll_top: f64, height: f64) -> Self {
        Self {
            top: scroll_top,
            bottom: scroll_top + height.max(0.0),
        }
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Check if `geometry` intersects the bounds grown by `threshold` on both edges
    pub fn intersects(&self, geometry: ElementGeometry, threshold: f64) -> bool {
        geometry.bottom() >= self.top - threshold && geometry.top <= self.bottom + threshold
    }
}

/// Viewport tracker
///
/// Bounds are only refreshed by [`ViewportTracker::recalculate`], so callers
/// decide how often the source is read.
pub struct ViewportTracker {
    source: Rc<dyn ViewportSource>,
    bounds: ViewportBounds,
    default_threshold: f64,
}

impl ViewportTracker {
    pub fn new(source: Rc<dyn ViewportSource>, default_threshold: f64) -> Self {
        let bounds = ViewportBounds::new(source.scroll_top(), source.viewport_height());
        Self {
            source,
            bounds,
            default_threshold,
        }
    }

    /// Re-read bounds from the source
    pub fn recalculate(&mut self) {
        self.bounds = ViewportBounds::new(self.source.scroll_top(), self.source.viewport_height());
    }

    pub fn bounds(&self) -> ViewportBounds {
        self.bounds
    }

    pub fn default_threshold(&self) -> f64 {
        self.default_threshold
    }

    /// Check visibility against the last computed bounds
    pub fn is_visible(&self, geometry: ElementGeometry, threshold: f64) -> bool {
        self.bounds.intersects(geometry, threshold)
    }

    /// Refresh bounds, then keep the visible items in input order
    ///
    /// `None` or a zero threshold uses the default threshold.
    pub fn filter_visible<T: Positioned + Clone>(&mut self, items: &[T], threshold: Option<f64>) -> Vec<T> {
        self.recalculate();
        let threshold = self.resolve_threshold(threshold);
        items
            .iter()
            .filter(|item| self.is_visible(item.geometry(), threshold))
            .cloned()
            .collect()
    }

    fn resolve_threshold(&self, threshold: Option<f64>) -> f64 {
        match threshold {
            Some(t) if t != 0.0 => t,
            _ => self.default_threshold,
        }
    }
}

impl std::fmt::Debug for ViewportTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewportTracker")
            .field("bounds", &self.bounds)
            .field("default_threshold", &self.default_threshold)
            .finish_non_exhaustive()
    }
}

/// Window metrics set by the host
#[derive(Debug, Default)]
pub struct WindowMetrics {
    scroll_top: Cell<f64>,
    height: Cell<f64>,
}

impl WindowMetrics {
    pub fn new(scroll_top: f64, height: f64) -> Self {
        Self {
            scroll_top: Cell::new(scroll_top),
            height: Cell::new(height),
        }
    }

    pub fn scroll_to(&self, scroll_top: f64) {
        self.scroll_top.set(scroll_top);
    }

    pub fn resize(&self, height: f64) {
        self.height.set(height);
    }
}

impl ViewportSource for WindowMetrics {
    fn scroll_top(&self) -> f64 {
        self.scroll_top.get()
    }

    fn viewport_height(&self) -> f64 {
        self.height.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Block(&'static str, ElementGeometry);

    impl Positioned for Block {
        fn geometry(&self) -> ElementGeometry {
            self.1
        }
    }

    fn tracker(scroll_top: f64, height: f64) -> (Rc<WindowMetrics>, ViewportTracker) {
        let metrics = Rc::new(WindowMetrics::new(scroll_top, height));
        let tracker = ViewportTracker::new(metrics.clone(), 0.0);
        (metrics, tracker)
    }

    #[test]
    fn test_bounds_invariant() {
        let bounds = ViewportBounds::new(100.0, -50.0);
        assert_eq!(bounds.top, 100.0);
        assert_eq!(bounds.bottom, 100.0);
        assert!(bounds.bottom >= bounds.top);
    }

    #[test]
    fn test_visibility_edges_are_inclusive() {
        let (_, tracker) = tracker(0.0, 600.0);

        // Touches the bottom edge
        assert!(tracker.is_visible(ElementGeometry::new(600.0, 100.0), 0.0));
        // Just below
        assert!(!tracker.is_visible(ElementGeometry::new(600.5, 100.0), 0.0));
        // Zero-height element at the top edge
        assert!(tracker.is_visible(ElementGeometry::new(0.0, 0.0), 0.0));
    }

    #[test]
    fn test_threshold_extends_both_edges() {
        let (_, tracker) = tracker(1000.0, 600.0);

        let below = ElementGeometry::new(1850.0, 100.0);
        assert!(!tracker.is_visible(below, 0.0));
        assert!(tracker.is_visible(below, 300.0));

        let above = ElementGeometry::new(600.0, 200.0);
        assert!(!tracker.is_visible(above, 100.0));
        assert!(tracker.is_visible(above, 200.0));
    }

    #[test]
    fn test_visibility_is_monotonic_in_threshold() {
        let (_, tracker) = tracker(500.0, 400.0);
        let geometries = [
            ElementGeometry::new(0.0, 10.0),
            ElementGeometry::new(450.0, 20.0),
            ElementGeometry::new(700.0, 50.0),
            ElementGeometry::new(1200.0, 300.0),
            ElementGeometry::new(5000.0, 1.0),
        ];
        let thresholds = [0.0, 10.0, 50.0, 100.0, 300.0, 1000.0, 5000.0];

        for geometry in geometries {
            for (i, &t) in thresholds.iter().enumerate() {
                if tracker.is_visible(geometry, t) {
                    for &larger in &thresholds[i..] {
                        assert!(tracker.is_visible(geometry, larger), "{geometry:?} at {larger}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_filter_preserves_order() {
        let (_, mut tracker) = tracker(0.0, 500.0);
        let items = vec![
            Block("a", ElementGeometry::new(400.0, 50.0)),
            Block("b", ElementGeometry::new(2000.0, 50.0)),
            Block("c", ElementGeometry::new(10.0, 50.0)),
            Block("d", ElementGeometry::new(480.0, 50.0)),
        ];

        let visible = tracker.filter_visible(&items, None);
        let names: Vec<_> = visible.iter().map(|b| b.0).collect();
        assert_eq!(names, vec!["a", "c", "d"]);
    }

    #[test]
    fn test_filter_empty_input() {
        let (_, mut tracker) = tracker(0.0, 500.0);
        let visible: Vec<Block> = tracker.filter_visible(&[], Some(100.0));
        assert!(visible.is_empty());
    }

    #[test]
    fn test_filter_recalculates_bounds() {
        let (metrics, mut tracker) = tracker(0.0, 500.0);
        let items = vec![Block("far", ElementGeometry::new(3000.0, 100.0))];

        assert!(tracker.filter_visible(&items, None).is_empty());

        metrics.scroll_to(2600.0);
        // Stale until recalculated
        assert!(!tracker.is_visible(items[0].1, 0.0));
        assert_eq!(tracker.filter_visible(&items, None), items);
        assert_eq!(tracker.bounds(), ViewportBounds::new(2600.0, 500.0));
    }

    #[test]
    fn test_zero_threshold_uses_default() {
        let metrics = Rc::new(WindowMetrics::new(0.0, 500.0));
        let mut tracker = ViewportTracker::new(metrics, 300.0);
        let items = vec![Block("near", ElementGeometry::new(700.0, 10.0))];

        assert_eq!(tracker.filter_visible(&items, Some(0.0)).len(), 1);
        assert_eq!(tracker.filter_visible(&items, None).len(), 1);
        assert!(tracker.filter_visible(&items, Some(50.0)).is_empty());
    }
}
