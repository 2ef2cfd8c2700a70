//! Visibility Tracker: hydrate on enter, debounced dehydrate on leave.

use tracing::debug;

use crate::common::{Deferred, TimerKind, Wake};
use crate::item::ItemId;
use crate::state::Cx;
use crate::surface::Surface;

use super::dehydrate;

pub(crate) fn on_enter<S: Surface>(cx: &mut Cx<'_, S>, id: ItemId) {
    if !cx.surface.contains(id) {
        return;
    }
    cx.session.store.enter(id);
    if dehydrate::hydrate(cx.surface, &mut cx.session.store, id) {
        debug!(item = id.0, "hydrated on enter");
    }
}

pub(crate) fn on_leave<S: Surface>(cx: &mut Cx<'_, S>, id: ItemId) {
    if !cx.session.store.is_visible(id) {
        return;
    }
    cx.session.store.leave(id);
    cx.timers.cancel_kind(TimerKind::Sweep, cx.effects);
    let delay = cx.timings.sweep_debounce();
    cx.timers.schedule(Deferred::Sweep, Wake::After(delay), cx.effects);
}

/// Collapses the items that left the margin during the debounce window.
pub(crate) fn sweep<S: Surface>(cx: &mut Cx<'_, S>) {
    if cx.session.processing.is_busy() {
        debug!("sweep dropped: bulk pass in progress");
        return;
    }
    let exited = cx.session.store.take_exited();
    if exited.is_empty() {
        return;
    }

    let ids = cx.surface.item_ids();
    let total = ids.len();
    let candidates: Vec<ItemId> = exited
        .into_iter()
        .filter(|id| {
            ids.iter()
                .position(|other| other == id)
                .is_some_and(|index| !cx.is_protected(*id, index, total))
        })
        .collect();

    let collapsed = dehydrate::dehydrate_batch(cx, &candidates);
    debug!(collapsed, "sweep");
}
