//! Budget Trimmer.
//!
//! Keeps the hydrated count at or under `tail + 2 * buffer` while items
//! stream in one at a time. Oldest eligible items go first.

use tracing::debug;

use crate::item::ItemId;
use crate::state::Cx;
use crate::surface::Surface;

use super::dehydrate;

pub(crate) fn trim<S: Surface>(cx: &mut Cx<'_, S>) -> usize {
    if cx.session.processing.is_busy() {
        debug!("trim dropped: bulk pass in progress");
        return 0;
    }
    let budget = cx.options.max_hydrated();
    let ids = cx.surface.item_ids();
    let total = ids.len();

    let hydrated: Vec<(usize, ItemId)> = ids
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, id)| cx.surface.markers(*id).is_some_and(|m| !m.dehydrated))
        .collect();
    let excess = hydrated.len().saturating_sub(budget);
    if excess == 0 {
        return 0;
    }

    let victims: Vec<ItemId> = hydrated
        .into_iter()
        .filter(|(index, id)| !cx.is_protected(*id, *index, total))
        .map(|(_, id)| id)
        .take(excess)
        .collect();
    let trimmed = dehydrate::dehydrate_batch(cx, &victims);
    debug!(budget, excess, trimmed, "trim");
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Options, Timings};
    use crate::state::{Session, WindowState};
    use crate::surface::MemorySurface;
    use crate::windowing::dehydrate;

    /// Twelve items of which the first five are already collapsed, leaving
    /// exactly `tail + 2 * buffer` hydrated.
    fn at_budget() -> (WindowState, MemorySurface, Vec<ItemId>) {
        let mut surface = MemorySurface::new(300.0);
        let ids = surface.push_items([100.0; 12]);
        surface.layout();
        let mut state = WindowState::new(Options::default(), Timings::default());
        let mut session = Session::default();
        for id in &ids[..5] {
            dehydrate(&mut surface, &mut session.store, *id);
        }
        state.session = Some(session);
        (state, surface, ids)
    }

    #[test]
    fn test_single_append_at_budget_trims_one_front_item() {
        let (mut state, mut surface, ids) = at_budget();
        surface.push_items([100.0]);
        let mut effects = Vec::new();
        let mut cx = Cx::of(&mut state, &mut surface, &mut effects).unwrap();

        assert_eq!(trim(&mut cx), 1);
        assert!(surface.is_dehydrated(ids[5]));
        assert_eq!(surface.dehydrated_count(), 6);
    }

    #[test]
    fn test_trim_skips_protected_items() {
        let (mut state, mut surface, ids) = at_budget();
        surface.push_items([100.0; 2]);
        surface.set_editing(ids[5], true);
        state.session.as_mut().unwrap().store.enter(ids[6]);
        let mut effects = Vec::new();
        let mut cx = Cx::of(&mut state, &mut surface, &mut effects).unwrap();

        assert_eq!(trim(&mut cx), 2);
        assert!(!surface.is_dehydrated(ids[5]));
        assert!(!surface.is_dehydrated(ids[6]));
        assert!(surface.is_dehydrated(ids[7]));
        assert!(surface.is_dehydrated(ids[8]));
    }

    #[test]
    fn test_trim_under_budget_is_a_no_op() {
        let (mut state, mut surface, _) = at_budget();
        let mut effects = Vec::new();
        let mut cx = Cx::of(&mut state, &mut surface, &mut effects).unwrap();

        assert_eq!(trim(&mut cx), 0);
        assert_eq!(surface.dehydrated_count(), 5);
    }
}
