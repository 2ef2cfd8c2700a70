//! Dehydration Engine.
//!
//! Collapsing an item is a read (its rendered height) followed by a write
//! (markers plus placeholder style). Whenever more than one item is involved
//! all reads happen before any write, so the rendering layer lays out once
//! instead of once per item.

use tracing::debug;

use crate::common::{Deferred, TimerKind, Wake};
use crate::config::{Options, Timings};
use crate::item::{ItemId, ItemMarkers, ItemStore};
use crate::state::{BulkPass, Cx, Processing};
use crate::surface::{ItemStyle, Surface};

use super::scroll;

/// Items kept hydrated at the end of the list by a bulk pass.
pub fn keep_count(viewport_height: f64, options: &Options, timings: &Timings) -> usize {
    let per_viewport =
        (viewport_height.max(0.0) / timings.estimated_item_height_px).ceil() as usize;
    (per_viewport + 2 * options.buffer_size)
        .max(options.always_visible_tail)
        .max(1)
}

/// Collapses one item. No-op if it is already dehydrated or gone.
pub fn dehydrate<S: Surface>(surface: &mut S, store: &mut ItemStore, id: ItemId) -> bool {
    collapse(surface, store, &[id]) == 1
}

/// Restores one item to normal flow. No-op if it is not dehydrated.
pub fn hydrate<S: Surface>(surface: &mut S, store: &mut ItemStore, id: ItemId) -> bool {
    let Some(markers) = surface.markers(id) else {
        return false;
    };
    store.record_restored(id);
    if !markers.dehydrated {
        return false;
    }
    surface.set_markers(id, ItemMarkers::default());
    surface.set_style(id, ItemStyle::default());
    true
}

/// Collapses several items: every height is read before anything is written.
pub(crate) fn dehydrate_batch<S: Surface>(cx: &mut Cx<'_, S>, ids: &[ItemId]) -> usize {
    collapse(cx.surface, &mut cx.session.store, ids)
}

/// Starts a bulk pass: force real heights, read them, reset the VisibleSet to
/// the kept tail (restoring any of it a sweep collapsed earlier), and schedule
/// the write phase for the next frame.
///
/// Returns false if another pass is in flight or the container is gone.
pub(crate) fn begin_bulk<S: Surface>(cx: &mut Cx<'_, S>, pin_after: bool) -> bool {
    if cx.session.processing.is_busy() {
        debug!("bulk pass already in progress; skipping");
        return false;
    }
    if !cx.surface.is_connected() {
        return false;
    }

    let ids = cx.surface.item_ids();
    let keep = keep_count(cx.surface.viewport_height(), cx.options, cx.timings);
    let end = ids.len().saturating_sub(keep);
    let head = &ids[..end];

    let (reads, forced) = read_heights(cx.surface, head);

    cx.session.store.reset_visible(ids[end..].iter().copied());
    let restored = restore_visible(cx);
    debug!(
        total = ids.len(),
        keep,
        collapsing = reads.len(),
        restored,
        "bulk pass: heights read"
    );

    cx.session.processing = Processing::BulkInProgress(BulkPass {
        reads,
        forced,
        pin_after,
    });
    cx.timers.schedule(Deferred::BulkCommit, Wake::Frames(1), cx.effects);
    true
}

/// Phase c of a bulk pass: write placeholders, then drop the overrides.
pub(crate) fn commit_bulk<S: Surface>(cx: &mut Cx<'_, S>) {
    let Processing::BulkInProgress(pass) = std::mem::take(&mut cx.session.processing) else {
        return;
    };

    let ids = cx.surface.item_ids();
    let total = ids.len();
    let mut written = 0;
    for (id, height) in &pass.reads {
        let Some(index) = ids.iter().position(|other| other == id) else {
            continue;
        };
        if cx.is_protected(*id, index, total) {
            continue;
        }
        if cx.surface.markers(*id).is_some_and(|m| m.dehydrated) {
            continue;
        }
        write_placeholder(cx.surface, &mut cx.session.store, *id, *height);
        written += 1;
    }
    let restored = restore_visible(cx);
    drop_overrides(cx.surface, &pass.forced);
    debug!(written, restored, "bulk pass: placeholders written");

    if pass.pin_after {
        scroll::scroll_to_bottom(cx);
    }
}

/// Abandons an in-flight bulk pass without writing anything.
pub(crate) fn abort_bulk<S: Surface>(cx: &mut Cx<'_, S>) {
    cx.timers.cancel_kind(TimerKind::BulkCommit, cx.effects);
    if let Processing::BulkInProgress(pass) = std::mem::take(&mut cx.session.processing) {
        drop_overrides(cx.surface, &pass.forced);
    }
}

/// Restores every item in the container. Returns how many were collapsed.
pub fn rehydrate_all<S: Surface>(surface: &mut S, store: &mut ItemStore) -> usize {
    let mut restored = 0;
    for id in surface.item_ids() {
        if surface.style(id).is_some_and(|style| style.force_layout) {
            drop_overrides(surface, &[id]);
        }
        if hydrate(surface, store, id) {
            restored += 1;
        }
    }
    restored
}

/// Hydrates VisibleSet members that are still collapsed.
fn restore_visible<S: Surface>(cx: &mut Cx<'_, S>) -> usize {
    let visible: Vec<ItemId> = cx.session.store.visible().collect();
    visible
        .into_iter()
        .filter(|id| hydrate(cx.surface, &mut cx.session.store, *id))
        .count()
}

fn collapse<S: Surface>(surface: &mut S, store: &mut ItemStore, ids: &[ItemId]) -> usize {
    let (reads, forced) = read_heights(surface, ids);
    for (id, height) in &reads {
        write_placeholder(surface, store, *id, *height);
    }
    drop_overrides(surface, &forced);
    reads.len()
}

/// Phases a and b: force real layout on every hydrated item, then read all
/// heights. Returns the heights and the items whose override was set here.
fn read_heights<S: Surface>(
    surface: &mut S,
    ids: &[ItemId],
) -> (Vec<(ItemId, f64)>, Vec<ItemId>) {
    let hydrated: Vec<ItemId> = ids
        .iter()
        .copied()
        .filter(|id| surface.markers(*id).is_some_and(|m| !m.dehydrated))
        .collect();

    let mut forced = Vec::new();
    for id in &hydrated {
        let Some(style) = surface.style(*id) else {
            continue;
        };
        if style.force_layout {
            continue;
        }
        surface.set_style(
            *id,
            ItemStyle {
                force_layout: true,
                ..style
            },
        );
        forced.push(*id);
    }

    let reads = hydrated
        .into_iter()
        .filter_map(|id| surface.measure(id).map(|height| (id, height)))
        .collect();
    (reads, forced)
}

fn write_placeholder<S: Surface>(
    surface: &mut S,
    store: &mut ItemStore,
    id: ItemId,
    height: f64,
) {
    surface.set_markers(id, ItemMarkers::dehydrated(height));
    surface.set_style(id, ItemStyle::placeholder(height));
    store.record_collapsed(id);
}

fn drop_overrides<S: Surface>(surface: &mut S, ids: &[ItemId]) {
    for id in ids {
        if let Some(style) = surface.style(*id)
            && style.force_layout
        {
            surface.set_style(
                *id,
                ItemStyle {
                    force_layout: false,
                    ..style
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MemorySurface;

    #[test]
    fn test_keep_count_matches_worked_example() {
        let options = Options {
            buffer_size: 2,
            always_visible_tail: 3,
            bulk_load_threshold: 10,
        };
        assert_eq!(keep_count(600.0, &options, &Timings::default()), 8);
    }

    #[test]
    fn test_keep_count_never_below_tail() {
        let options = Options {
            buffer_size: 0,
            always_visible_tail: 12,
            bulk_load_threshold: 10,
        };
        assert_eq!(keep_count(300.0, &options, &Timings::default()), 12);
    }

    #[test]
    fn test_dehydrate_then_hydrate_leaves_no_overrides() {
        let mut surface = MemorySurface::new(400.0);
        let ids = surface.push_items([180.0, 90.0]);
        surface.layout();
        let mut store = ItemStore::default();

        assert!(dehydrate(&mut surface, &mut store, ids[0]));
        assert_eq!(surface.markers(ids[0]), Some(ItemMarkers::dehydrated(180.0)));
        assert_eq!(surface.style(ids[0]), Some(ItemStyle::placeholder(180.0)));
        surface.layout();
        assert_eq!(surface.bounds(ids[0]).map(|b| b.height), Some(180.0));

        // Second collapse is a no-op.
        assert!(!dehydrate(&mut surface, &mut store, ids[0]));

        assert!(hydrate(&mut surface, &mut store, ids[0]));
        assert_eq!(surface.markers(ids[0]), Some(ItemMarkers::default()));
        assert_eq!(surface.style(ids[0]), Some(ItemStyle::default()));
        assert_eq!(store.collapsed_len(), 0);

        assert!(!hydrate(&mut surface, &mut store, ids[1]));
    }

    #[test]
    fn test_rehydrate_all_clears_every_marker() {
        let mut surface = MemorySurface::new(400.0);
        let ids = surface.push_items([100.0; 6]);
        let mut store = ItemStore::default();
        for id in &ids[..4] {
            dehydrate(&mut surface, &mut store, *id);
        }
        surface.set_style(
            ids[5],
            ItemStyle {
                force_layout: true,
                ..ItemStyle::default()
            },
        );

        assert_eq!(rehydrate_all(&mut surface, &mut store), 4);
        assert_eq!(surface.dehydrated_count(), 0);
        for id in ids {
            assert_eq!(surface.style(id), Some(ItemStyle::default()));
        }
    }
}
