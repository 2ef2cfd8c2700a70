//! Host container abstraction.
//!
//! A [`Surface`] is the scrollable list root plus the rendering layer behind
//! it. Reads (`measure`, `scroll_height`, `bounds`) and writes (`set_style`,
//! `set_markers`, `set_scroll_top`) are synchronous, mirroring element-tree
//! access. Implementations backed by a real UI toolkit map these onto its
//! layout and style primitives; [`MemorySurface`] is the in-process model
//! used by tests and the simulator.

mod memory;

pub use memory::MemorySurface;

use crate::item::{ItemId, ItemMarkers};

/// Inline sizing and visibility overrides on one item.
///
/// The default value means "no overrides": the item participates in normal
/// flow.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ItemStyle {
    /// Fixed box height in px.
    pub fixed_height: Option<f64>,
    /// Clip overflowing content.
    pub clip_overflow: bool,
    /// Skip painting and layout of the subtree (hidden, space reserved).
    pub skip_paint: bool,
    /// Force real layout even where the engine would substitute a nominal
    /// size for off-screen content.
    pub force_layout: bool,
}

impl ItemStyle {
    /// Placeholder style for a dehydrated item of the given height.
    pub fn placeholder(height: f64) -> Self {
        Self {
            fixed_height: Some(height),
            clip_overflow: true,
            skip_paint: true,
            force_layout: false,
        }
    }
}

/// Vertical box of an item as of the last layout pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub top: f64,
    pub height: f64,
}

impl Bounds {
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn intersects(&self, start: f64, end: f64) -> bool {
        self.bottom() > start && self.top < end
    }
}

/// One batch of child additions/removals on the container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildMutation {
    pub added: Vec<ItemId>,
    pub removed: Vec<ItemId>,
}

impl ChildMutation {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

pub trait Surface {
    /// False once the container has been detached from the tree.
    fn is_connected(&self) -> bool;

    /// Items in document order.
    fn item_ids(&self) -> Vec<ItemId>;

    fn item_count(&self) -> usize {
        self.item_ids().len()
    }

    fn contains(&self, id: ItemId) -> bool;

    fn viewport_height(&self) -> f64;

    fn scroll_top(&self) -> f64;

    /// Total scrollable height as last computed by layout.
    fn scroll_height(&self) -> f64;

    fn set_scroll_top(&mut self, top: f64);

    /// Scrolls so the item's bottom edge is inside the viewport.
    fn scroll_into_view(&mut self, id: ItemId);

    fn bounds(&self, id: ItemId) -> Option<Bounds>;

    /// Rendered height of the item, as the rendering layer reports it.
    fn measure(&self, id: ItemId) -> Option<f64>;

    fn style(&self, id: ItemId) -> Option<ItemStyle>;

    fn set_style(&mut self, id: ItemId, style: ItemStyle);

    fn markers(&self, id: ItemId) -> Option<ItemMarkers>;

    fn set_markers(&mut self, id: ItemId, markers: ItemMarkers);

    /// Set by the edit-mode collaborator, never by the engine.
    fn is_editing(&self, id: ItemId) -> bool;

    /// Child mutations recorded since the last call.
    fn drain_mutations(&mut self) -> Vec<ChildMutation> {
        Vec::new()
    }

    /// Called by the runtime at every render-frame boundary.
    fn end_frame(&mut self) {}
}
