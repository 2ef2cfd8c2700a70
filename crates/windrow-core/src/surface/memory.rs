//! In-memory container model.
//!
//! Behaves like a scrollable list in a layout engine in the two ways that
//! matter to the windowing core:
//!
//! - Layout is deferred. Scroll height and item bounds only refresh at frame
//!   boundaries (or an explicit [`MemorySurface::layout`]), and scroll
//!   assignments clamp against the stale scroll height. A single "scroll to
//!   bottom" issued right after heights change therefore lands short.
//! - Optional lazy painting. Off-screen items without an accuracy override
//!   report a nominal height instead of their real one.

use std::collections::HashMap;

use super::{Bounds, ChildMutation, ItemStyle, Surface};
use crate::item::{ItemId, ItemMarkers};

#[derive(Debug, Clone)]
struct MemoryItem {
    id: ItemId,
    natural_height: f64,
    markers: ItemMarkers,
    style: ItemStyle,
    editing: bool,
}

#[derive(Debug, Clone)]
pub struct MemorySurface {
    connected: bool,
    items: Vec<MemoryItem>,
    index: HashMap<ItemId, usize>,
    viewport_height: f64,
    scroll_top: f64,
    /// Nominal height reported for off-screen content, when lazy painting.
    lazy_paint: Option<f64>,
    layout: HashMap<ItemId, Bounds>,
    laid_out_height: f64,
    mutations: Vec<ChildMutation>,
    next_id: u64,
}

impl MemorySurface {
    pub fn new(viewport_height: f64) -> Self {
        Self {
            connected: true,
            items: Vec::new(),
            index: HashMap::new(),
            viewport_height: viewport_height.max(0.0),
            scroll_top: 0.0,
            lazy_paint: None,
            layout: HashMap::new(),
            laid_out_height: 0.0,
            mutations: Vec::new(),
            next_id: 0,
        }
    }

    /// Report `nominal` for items away from the viewport unless forced.
    #[must_use]
    pub fn with_lazy_paint(mut self, nominal: f64) -> Self {
        self.lazy_paint = Some(nominal);
        self
    }

    /// Appends items with the given natural heights.
    pub fn push_items(&mut self, heights: impl IntoIterator<Item = f64>) -> Vec<ItemId> {
        let added = self.append(heights);
        self.record(ChildMutation {
            added: added.clone(),
            removed: Vec::new(),
        });
        added
    }

    /// Swaps the whole item set in one mutation (a chat switch).
    pub fn replace_items(&mut self, heights: impl IntoIterator<Item = f64>) -> Vec<ItemId> {
        let removed: Vec<ItemId> = self.items.drain(..).map(|item| item.id).collect();
        self.index.clear();
        let added = self.append(heights);
        self.record(ChildMutation {
            added: added.clone(),
            removed,
        });
        added
    }

    pub fn remove_front(&mut self, count: usize) -> Vec<ItemId> {
        let count = count.min(self.items.len());
        let removed: Vec<ItemId> = self.items.drain(..count).map(|item| item.id).collect();
        self.reindex();
        self.record(ChildMutation {
            added: Vec::new(),
            removed: removed.clone(),
        });
        removed
    }

    pub fn set_editing(&mut self, id: ItemId, editing: bool) {
        if let Some(item) = self.item_mut(id) {
            item.editing = editing;
        }
    }

    /// What an edit-mode collaborator does to reveal a collapsed item.
    pub fn clear_marker_externally(&mut self, id: ItemId) {
        if let Some(item) = self.item_mut(id) {
            item.markers = ItemMarkers::default();
            item.style = ItemStyle::default();
        }
    }

    pub fn scroll_to(&mut self, top: f64) {
        self.set_scroll_top(top);
    }

    /// Lays out and scrolls to the very end, like a host's own first paint.
    pub fn scroll_to_end(&mut self) {
        self.layout();
        self.set_scroll_top(self.laid_out_height);
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    /// Recomputes item bounds and the scroll height.
    pub fn layout(&mut self) {
        let mut top = 0.0;
        let mut layout = HashMap::with_capacity(self.items.len());
        for item in &self.items {
            let height = self.rendered_height(item);
            layout.insert(item.id, Bounds { top, height });
            top += height;
        }
        self.layout = layout;
        self.laid_out_height = top;
        self.scroll_top = self.scroll_top.clamp(0.0, self.max_scroll_top());
    }

    pub fn natural_height(&self, id: ItemId) -> Option<f64> {
        self.item(id).map(|item| item.natural_height)
    }

    pub fn is_dehydrated(&self, id: ItemId) -> bool {
        self.item(id).is_some_and(|item| item.markers.dehydrated)
    }

    pub fn dehydrated_ids(&self) -> Vec<ItemId> {
        self.items
            .iter()
            .filter(|item| item.markers.dehydrated)
            .map(|item| item.id)
            .collect()
    }

    pub fn dehydrated_count(&self) -> usize {
        self.items.iter().filter(|item| item.markers.dehydrated).count()
    }

    pub fn hydrated_count(&self) -> usize {
        self.items.len() - self.dehydrated_count()
    }

    /// Whether the end of the content as it would render now is on screen,
    /// regardless of whether layout has caught up.
    pub fn at_bottom(&self) -> bool {
        let content: f64 = self.items.iter().map(|item| self.rendered_height(item)).sum();
        content - self.viewport_height - self.scroll_top <= 1.0
    }

    fn append(&mut self, heights: impl IntoIterator<Item = f64>) -> Vec<ItemId> {
        let mut added = Vec::new();
        for height in heights {
            let id = ItemId(self.next_id);
            self.next_id += 1;
            self.index.insert(id, self.items.len());
            self.items.push(MemoryItem {
                id,
                natural_height: height.max(0.0),
                markers: ItemMarkers::default(),
                style: ItemStyle::default(),
                editing: false,
            });
            added.push(id);
        }
        added
    }

    fn record(&mut self, mutation: ChildMutation) {
        if !mutation.is_empty() {
            self.mutations.push(mutation);
        }
    }

    fn reindex(&mut self) {
        self.index = self
            .items
            .iter()
            .enumerate()
            .map(|(idx, item)| (item.id, idx))
            .collect();
    }

    fn item(&self, id: ItemId) -> Option<&MemoryItem> {
        self.index.get(&id).map(|&idx| &self.items[idx])
    }

    fn item_mut(&mut self, id: ItemId) -> Option<&mut MemoryItem> {
        let idx = *self.index.get(&id)?;
        self.items.get_mut(idx)
    }

    fn max_scroll_top(&self) -> f64 {
        (self.laid_out_height - self.viewport_height).max(0.0)
    }

    fn rendered_height(&self, item: &MemoryItem) -> f64 {
        if let Some(height) = item.style.fixed_height {
            return height;
        }
        match self.lazy_paint {
            Some(nominal) if !item.style.force_layout && !self.near_viewport(item.id) => nominal,
            _ => item.natural_height,
        }
    }

    /// Within one viewport height of the visible area, per the last layout.
    fn near_viewport(&self, id: ItemId) -> bool {
        self.layout.get(&id).is_some_and(|bounds| {
            bounds.intersects(
                self.scroll_top - self.viewport_height,
                self.scroll_top + 2.0 * self.viewport_height,
            )
        })
    }
}

impl Surface for MemorySurface {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn item_ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|item| item.id).collect()
    }

    fn item_count(&self) -> usize {
        self.items.len()
    }

    fn contains(&self, id: ItemId) -> bool {
        self.index.contains_key(&id)
    }

    fn viewport_height(&self) -> f64 {
        self.viewport_height
    }

    fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    fn scroll_height(&self) -> f64 {
        self.laid_out_height
    }

    fn set_scroll_top(&mut self, top: f64) {
        if !self.connected {
            return;
        }
        self.scroll_top = top.clamp(0.0, self.max_scroll_top());
    }

    fn scroll_into_view(&mut self, id: ItemId) {
        if !self.connected {
            return;
        }
        // Scrolling an element into view forces a synchronous layout.
        self.layout();
        if let Some(bounds) = self.layout.get(&id).copied() {
            self.set_scroll_top(bounds.bottom() - self.viewport_height);
        }
    }

    fn bounds(&self, id: ItemId) -> Option<Bounds> {
        self.layout.get(&id).copied()
    }

    fn measure(&self, id: ItemId) -> Option<f64> {
        self.item(id).map(|item| self.rendered_height(item))
    }

    fn style(&self, id: ItemId) -> Option<ItemStyle> {
        self.item(id).map(|item| item.style)
    }

    fn set_style(&mut self, id: ItemId, style: ItemStyle) {
        if !self.connected {
            return;
        }
        if let Some(item) = self.item_mut(id) {
            item.style = style;
        }
    }

    fn markers(&self, id: ItemId) -> Option<ItemMarkers> {
        self.item(id).map(|item| item.markers)
    }

    fn set_markers(&mut self, id: ItemId, markers: ItemMarkers) {
        if !self.connected {
            return;
        }
        if let Some(item) = self.item_mut(id) {
            item.markers = markers;
        }
    }

    fn is_editing(&self, id: ItemId) -> bool {
        self.item(id).is_some_and(|item| item.editing)
    }

    fn drain_mutations(&mut self) -> Vec<ChildMutation> {
        std::mem::take(&mut self.mutations)
    }

    fn end_frame(&mut self) {
        if self.connected {
            self.layout();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scroll_clamps_to_stale_layout() {
        let mut surface = MemorySurface::new(500.0);
        surface.push_items([200.0; 5]);
        surface.scroll_to_end();
        assert!((surface.scroll_top() - 500.0).abs() < f64::EPSILON);

        surface.push_items([200.0; 5]);
        surface.set_scroll_top(surface.scroll_height());
        // Layout has not run, so the new items are not scrollable yet.
        assert!((surface.scroll_top() - 500.0).abs() < f64::EPSILON);

        surface.end_frame();
        surface.set_scroll_top(surface.scroll_height());
        assert!((surface.scroll_top() - 1500.0).abs() < f64::EPSILON);
        assert!(surface.at_bottom());
    }

    #[test]
    fn test_lazy_paint_reports_nominal_height_off_screen() {
        let mut surface = MemorySurface::new(300.0).with_lazy_paint(40.0);
        let ids = surface.push_items([120.0; 40]);
        surface.layout();
        surface.scroll_to_end();
        surface.layout();

        let first = ids[0];
        let last = ids[39];
        assert_eq!(surface.measure(first), Some(40.0));
        assert_eq!(surface.measure(last), Some(120.0));

        surface.set_style(
            first,
            ItemStyle {
                force_layout: true,
                ..ItemStyle::default()
            },
        );
        assert_eq!(surface.measure(first), Some(120.0));
    }

    #[test]
    fn test_mutations_are_recorded_and_drained() {
        let mut surface = MemorySurface::new(300.0);
        let first = surface.push_items([10.0, 10.0]);
        let removed = surface.remove_front(1);
        let replaced = surface.replace_items([10.0; 3]);

        let mutations = surface.drain_mutations();
        assert_eq!(mutations.len(), 3);
        assert_eq!(mutations[0].added, first);
        assert_eq!(mutations[1].removed, removed);
        assert_eq!(mutations[2].removed, vec![first[1]]);
        assert_eq!(mutations[2].added, replaced);
        assert!(surface.drain_mutations().is_empty());
    }

    #[test]
    fn test_writes_are_ignored_after_disconnect() {
        let mut surface = MemorySurface::new(300.0);
        let ids = surface.push_items([50.0]);
        surface.disconnect();
        surface.set_markers(ids[0], ItemMarkers::dehydrated(50.0));
        surface.set_style(ids[0], ItemStyle::placeholder(50.0));

        assert!(!surface.is_dehydrated(ids[0]));
        assert_eq!(surface.style(ids[0]), Some(ItemStyle::default()));
    }
}
