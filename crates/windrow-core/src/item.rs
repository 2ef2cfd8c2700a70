//! Item State Store.
//!
//! The authoritative per-item state lives in the tree itself as two markers
//! (dehydration flag and cached height), read and written through the
//! [`Surface`]. The store here keeps the engine-side bookkeeping around it:
//! the VisibleSet, the items that left the margin since the last sweep, and
//! which items this engine believes it collapsed, so that markers cleared by
//! another collaborator can be detected and respected.

use std::collections::BTreeSet;

use crate::surface::Surface;

/// Stable identity of one transcript item within its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub u64);

/// Markers persisted on the item element.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ItemMarkers {
    pub dehydrated: bool,
    pub cached_height: Option<f64>,
}

impl ItemMarkers {
    pub fn dehydrated(height: f64) -> Self {
        Self {
            dehydrated: true,
            cached_height: Some(height),
        }
    }
}

#[derive(Debug, Default)]
pub struct ItemStore {
    visible: BTreeSet<ItemId>,
    exited: BTreeSet<ItemId>,
    collapsed: BTreeSet<ItemId>,
    released: BTreeSet<ItemId>,
}

impl ItemStore {
    pub fn is_visible(&self, id: ItemId) -> bool {
        self.visible.contains(&id)
    }

    pub fn visible_len(&self) -> usize {
        self.visible.len()
    }

    pub fn visible(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.visible.iter().copied()
    }

    pub fn enter(&mut self, id: ItemId) {
        self.exited.remove(&id);
        self.visible.insert(id);
    }

    /// Leaving the margin also ends a release: the item is fair game again.
    pub fn leave(&mut self, id: ItemId) {
        self.visible.remove(&id);
        self.released.remove(&id);
        self.exited.insert(id);
    }

    /// Replaces the VisibleSet wholesale (bulk passes keep exactly the tail).
    pub fn reset_visible(&mut self, ids: impl IntoIterator<Item = ItemId>) {
        self.visible = ids.into_iter().collect();
        self.exited.clear();
    }

    pub fn take_exited(&mut self) -> Vec<ItemId> {
        std::mem::take(&mut self.exited).into_iter().collect()
    }

    pub fn record_collapsed(&mut self, id: ItemId) {
        self.collapsed.insert(id);
    }

    pub fn record_restored(&mut self, id: ItemId) {
        self.collapsed.remove(&id);
    }

    pub fn collapsed_len(&self) -> usize {
        self.collapsed.len()
    }

    /// Released items had their marker cleared by someone else. They stay
    /// hydrated until they next leave the viewport margin.
    pub fn is_released(&self, id: ItemId) -> bool {
        self.released.contains(&id)
    }

    /// Drops every trace of items that left the container.
    pub fn forget(&mut self, ids: &[ItemId]) {
        for id in ids {
            self.visible.remove(id);
            self.exited.remove(id);
            self.collapsed.remove(id);
            self.released.remove(id);
        }
    }

    /// Clears transient membership but keeps track of collapsed items,
    /// which still carry markers in the tree.
    pub fn reset_transient(&mut self) {
        self.visible.clear();
        self.exited.clear();
        self.released.clear();
    }

    /// Compares what this engine collapsed against the markers in the tree.
    ///
    /// Items whose marker was cleared externally become released. Returns how
    /// many were released.
    pub fn reconcile<S: Surface>(&mut self, surface: &S) -> usize {
        let mut released = 0;
        let collapsed: Vec<ItemId> = self.collapsed.iter().copied().collect();
        for id in collapsed {
            match surface.markers(id) {
                Some(markers) if markers.dehydrated => {}
                Some(_) => {
                    self.collapsed.remove(&id);
                    self.released.insert(id);
                    released += 1;
                }
                None => {
                    self.collapsed.remove(&id);
                }
            }
        }
        released
    }
}
