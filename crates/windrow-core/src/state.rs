//! Engine state.
//!
//! `WindowState` lives for the whole embedding; a `Session` exists only
//! between `Enable` and `Disable`. Everything transient (VisibleSet, pending
//! batch, processing guard) is owned by the session, so tearing it down is a
//! matter of dropping it after the markers in the tree have been cleared.

use serde::Serialize;

use crate::common::Timers;
use crate::config::{Options, Timings};
use crate::effects::WindowEffect;
use crate::item::{ItemId, ItemStore};
use crate::surface::Surface;
use crate::windowing::detector::PendingBatch;

/// Mutual exclusion for dehydration passes.
///
/// A bulk pass reads every height in one turn and writes on the next frame
/// boundary; while it is in flight, sweeps, trims and other bulk passes are
/// dropped.
#[derive(Debug, Default)]
pub enum Processing {
    #[default]
    Idle,
    BulkInProgress(BulkPass),
}

impl Processing {
    pub fn is_busy(&self) -> bool {
        matches!(self, Processing::BulkInProgress(_))
    }
}

/// Heights read by a bulk pass, waiting for the write phase.
#[derive(Debug, Default)]
pub struct BulkPass {
    /// Items to collapse, with the height read for each.
    pub reads: Vec<(ItemId, f64)>,
    /// Items whose accuracy override must be dropped afterwards.
    pub forced: Vec<ItemId>,
    /// Pin the viewport to the bottom once written.
    pub pin_after: bool,
}

#[derive(Debug, Default)]
pub struct Session {
    pub store: ItemStore,
    pub batch: PendingBatch,
    pub processing: Processing,
}

#[derive(Debug, Default)]
pub struct WindowState {
    pub options: Options,
    pub timings: Timings,
    pub session: Option<Session>,
    pub timers: Timers,
}

/// Snapshot of the working set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowStats {
    pub enabled: bool,
    pub total: usize,
    pub hydrated: usize,
    pub dehydrated: usize,
    pub visible: usize,
    pub processing: bool,
    pub pending_timers: usize,
    pub at_bottom: bool,
}

impl WindowState {
    pub fn new(options: Options, timings: Timings) -> Self {
        Self {
            options,
            timings,
            session: None,
            timers: Timers::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_visible(&self, id: ItemId) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.store.is_visible(id))
    }

    pub fn visible_ids(&self) -> Vec<ItemId> {
        self.session
            .as_ref()
            .map(|session| session.store.visible().collect())
            .unwrap_or_default()
    }

    pub fn stats<S: Surface>(&self, surface: &S) -> WindowStats {
        let ids = surface.item_ids();
        let dehydrated = ids
            .iter()
            .filter(|id| surface.markers(**id).is_some_and(|m| m.dehydrated))
            .count();
        let bottom_gap =
            surface.scroll_height() - surface.viewport_height() - surface.scroll_top();
        WindowStats {
            enabled: self.is_enabled(),
            total: ids.len(),
            hydrated: ids.len() - dehydrated,
            dehydrated,
            visible: self
                .session
                .as_ref()
                .map_or(0, |session| session.store.visible_len()),
            processing: self
                .session
                .as_ref()
                .is_some_and(|session| session.processing.is_busy()),
            pending_timers: self.timers.len(),
            at_bottom: bottom_gap <= 1.0,
        }
    }
}

/// Borrowed view of an enabled session for one reducer turn.
pub(crate) struct Cx<'a, S: Surface> {
    pub options: &'a Options,
    pub timings: &'a Timings,
    pub session: &'a mut Session,
    pub timers: &'a mut Timers,
    pub surface: &'a mut S,
    pub effects: &'a mut Vec<WindowEffect>,
}

impl<'a, S: Surface> Cx<'a, S> {
    /// Splits the state into a turn context, if a session is active.
    pub fn of(
        state: &'a mut WindowState,
        surface: &'a mut S,
        effects: &'a mut Vec<WindowEffect>,
    ) -> Option<Self> {
        let WindowState {
            options,
            timings,
            session,
            timers,
        } = state;
        Some(Cx {
            options,
            timings,
            session: session.as_mut()?,
            timers,
            surface,
            effects,
        })
    }

    /// Never collapsed: the last item, the protected tail, the item under
    /// edit, VisibleSet members, and items released by a collaborator.
    pub fn is_protected(&self, id: ItemId, index: usize, total: usize) -> bool {
        index + 1 >= total
            || index >= total.saturating_sub(self.options.always_visible_tail)
            || self.session.store.is_visible(id)
            || self.session.store.is_released(id)
            || self.surface.is_editing(id)
    }
}
