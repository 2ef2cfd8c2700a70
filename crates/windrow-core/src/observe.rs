//! Intersection observation for surfaces without a native observer.
//!
//! Runtimes poll the tracker after layout; it reports enter/leave transitions
//! for observed items against the viewport widened by a margin. The first
//! observation of an item reports an enter if it intersects and nothing
//! otherwise, so a freshly observed transcript never produces a burst of
//! leaves for content that was simply never on screen.

use std::collections::BTreeMap;

use crate::events::WindowEvent;
use crate::item::ItemId;
use crate::surface::Surface;

#[derive(Debug, Default)]
pub struct IntersectionTracker {
    /// Last known intersection per observed item (`None` = not yet polled).
    observed: BTreeMap<ItemId, Option<bool>>,
    margin: f64,
}

impl IntersectionTracker {
    pub fn set_margin(&mut self, px: f64) {
        self.margin = px.max(0.0);
    }

    pub fn observe(&mut self, items: impl IntoIterator<Item = ItemId>) {
        for id in items {
            self.observed.entry(id).or_insert(None);
        }
    }

    pub fn unobserve_all(&mut self) {
        self.observed.clear();
    }

    pub fn observed_len(&self) -> usize {
        self.observed.len()
    }

    /// Computes transitions since the previous poll.
    pub fn poll<S: Surface>(&mut self, surface: &S) -> Vec<WindowEvent> {
        if !surface.is_connected() {
            return Vec::new();
        }
        let start = surface.scroll_top() - self.margin;
        let end = surface.scroll_top() + surface.viewport_height() + self.margin;

        self.observed.retain(|id, _| surface.contains(*id));

        let mut events = Vec::new();
        for (id, last) in &mut self.observed {
            let now = surface
                .bounds(*id)
                .is_some_and(|bounds| bounds.intersects(start, end));
            match (*last, now) {
                (None | Some(false), true) => events.push(WindowEvent::ItemEntered(*id)),
                (Some(true), false) => events.push(WindowEvent::ItemLeft(*id)),
                _ => {}
            }
            *last = Some(now);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MemorySurface;

    #[test]
    fn test_first_poll_reports_only_entries() {
        let mut surface = MemorySurface::new(200.0);
        let ids = surface.push_items([100.0; 10]);
        surface.layout();

        let mut tracker = IntersectionTracker::default();
        tracker.observe(ids.iter().copied());
        let events = tracker.poll(&surface);

        assert_eq!(
            events,
            vec![
                WindowEvent::ItemEntered(ids[0]),
                WindowEvent::ItemEntered(ids[1]),
            ]
        );
        assert!(tracker.poll(&surface).is_empty());
    }

    #[test]
    fn test_margin_extends_the_viewport() {
        let mut surface = MemorySurface::new(200.0);
        let ids = surface.push_items([100.0; 10]);
        surface.layout();

        let mut tracker = IntersectionTracker::default();
        tracker.set_margin(250.0);
        tracker.observe(ids.iter().copied());

        // [−250, 450) covers items 0..=4.
        assert_eq!(tracker.poll(&surface).len(), 5);
    }

    #[test]
    fn test_scrolling_reports_leaves_and_entries() {
        let mut surface = MemorySurface::new(200.0);
        let ids = surface.push_items([100.0; 10]);
        surface.layout();

        let mut tracker = IntersectionTracker::default();
        tracker.observe(ids.iter().copied());
        tracker.poll(&surface);

        surface.scroll_to(800.0);
        let events = tracker.poll(&surface);

        assert!(events.contains(&WindowEvent::ItemLeft(ids[0])));
        assert!(events.contains(&WindowEvent::ItemLeft(ids[1])));
        assert!(events.contains(&WindowEvent::ItemEntered(ids[8])));
        assert!(events.contains(&WindowEvent::ItemEntered(ids[9])));
    }

    #[test]
    fn test_removed_items_are_dropped() {
        let mut surface = MemorySurface::new(200.0);
        let ids = surface.push_items([100.0; 3]);
        surface.layout();

        let mut tracker = IntersectionTracker::default();
        tracker.observe(ids.iter().copied());
        tracker.poll(&surface);
        surface.remove_front(3);

        assert!(tracker.poll(&surface).is_empty());
        assert_eq!(tracker.observed_len(), 0);
    }
}
