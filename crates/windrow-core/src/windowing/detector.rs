//! Bulk-Load / Chat-Switch Detector.
//!
//! Container mutations are counted into a [`PendingBatch`] until the settle
//! window passes without further change, then the whole burst is classified
//! once.

use tracing::debug;

use crate::common::{Deferred, TimerKind, Wake};
use crate::effects::WindowEffect;
use crate::state::Cx;
use crate::surface::{ChildMutation, Surface};

use super::{budget, dehydrate};

/// What a settled burst of container changes amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstKind {
    /// Items removed and added in the same window: the whole set was swapped.
    ChatSwitch,
    BulkLoad,
    IncrementalAppend,
    RemovalOnly,
    Empty,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PendingBatch {
    pub added: usize,
    pub removed: usize,
}

impl PendingBatch {
    pub fn record(&mut self, mutation: &ChildMutation) {
        self.added += mutation.added.len();
        self.removed += mutation.removed.len();
    }

    pub fn classify(&self, bulk_load_threshold: usize) -> BurstKind {
        match (self.added, self.removed) {
            (0, 0) => BurstKind::Empty,
            (0, _) => BurstKind::RemovalOnly,
            (_, removed) if removed > 0 => BurstKind::ChatSwitch,
            (added, _) if added >= bulk_load_threshold => BurstKind::BulkLoad,
            _ => BurstKind::IncrementalAppend,
        }
    }

    /// Returns the accumulated counts and resets the batch.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

pub(crate) fn on_children_changed<S: Surface>(cx: &mut Cx<'_, S>, mutation: &ChildMutation) {
    if mutation.is_empty() {
        return;
    }
    cx.session.store.forget(&mutation.removed);
    if !mutation.added.is_empty() {
        cx.effects.push(WindowEffect::Observe {
            items: mutation.added.clone(),
        });
    }
    cx.session.batch.record(mutation);

    cx.timers.cancel_kind(TimerKind::Settle, cx.effects);
    let delay = cx.timings.settle_window();
    cx.timers.schedule(Deferred::Settle, Wake::After(delay), cx.effects);
}

pub(crate) fn settle<S: Surface>(cx: &mut Cx<'_, S>) {
    let batch = cx.session.batch.take();
    let kind = batch.classify(cx.options.bulk_load_threshold);
    debug!(
        added = batch.added,
        removed = batch.removed,
        ?kind,
        "mutation burst settled"
    );
    match kind {
        BurstKind::ChatSwitch => chat_switch(cx),
        BurstKind::BulkLoad => {
            dehydrate::begin_bulk(cx, true);
        }
        BurstKind::IncrementalAppend => {
            budget::trim(cx);
        }
        BurstKind::RemovalOnly | BurstKind::Empty => {}
    }
}

/// Resets everything transient and re-registers tracking for the new set.
pub(crate) fn chat_switch<S: Surface>(cx: &mut Cx<'_, S>) {
    dehydrate::abort_bulk(cx);
    cx.session.store.reset_transient();
    cx.session.batch = PendingBatch::default();
    cx.timers.cancel_all(cx.effects);

    cx.effects.push(WindowEffect::UnobserveAll);
    cx.effects.push(WindowEffect::Observe {
        items: cx.surface.item_ids(),
    });
    let frames = cx.timings.chat_switch_frames;
    cx.timers.schedule(
        Deferred::ChatSwitchReprocess,
        Wake::Frames(frames),
        cx.effects,
    );
}

/// Processes the new item set as a fresh activation would.
pub(crate) fn reprocess<S: Surface>(cx: &mut Cx<'_, S>) {
    let total = cx.surface.item_count();
    if total >= cx.options.bulk_load_threshold {
        dehydrate::begin_bulk(cx, true);
    } else {
        debug!(total, "chat switch below bulk threshold; nothing to collapse");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemId;

    fn mutation(added: u64, removed: u64) -> ChildMutation {
        ChildMutation {
            added: (0..added).map(ItemId).collect(),
            removed: (100..100 + removed).map(ItemId).collect(),
        }
    }

    #[test]
    fn test_classify() {
        let cases = [
            ((0, 0), BurstKind::Empty),
            ((0, 4), BurstKind::RemovalOnly),
            ((1, 0), BurstKind::IncrementalAppend),
            ((9, 0), BurstKind::IncrementalAppend),
            ((10, 0), BurstKind::BulkLoad),
            ((3, 40), BurstKind::ChatSwitch),
            ((50, 40), BurstKind::ChatSwitch),
        ];
        for ((added, removed), expected) in cases {
            let batch = PendingBatch { added, removed };
            assert_eq!(batch.classify(10), expected, "added={added} removed={removed}");
        }
    }

    #[test]
    fn test_batch_accumulates_until_taken() {
        let mut batch = PendingBatch::default();
        batch.record(&mutation(4, 0));
        batch.record(&mutation(7, 2));

        let taken = batch.take();
        assert_eq!(taken, PendingBatch { added: 11, removed: 2 });
        assert_eq!(batch, PendingBatch::default());
    }
}
