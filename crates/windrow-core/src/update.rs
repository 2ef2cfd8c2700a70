//! Windowing reducer (update function).
//!
//! All engine state changes happen here. A runtime calls
//! `update(state, surface, event)`, applies nothing itself except the
//! returned effects, and feeds timer wake-ups and intersection transitions
//! back in as events.

use tracing::{debug, info, warn};

use crate::common::{Deferred, Wake};
use crate::effects::WindowEffect;
use crate::events::WindowEvent;
use crate::item::ItemStore;
use crate::state::{Cx, Session, WindowState};
use crate::surface::Surface;
use crate::windowing::{self, dehydrate, detector, scroll};

/// The main reducer function.
///
/// Never fails: guards skip work that cannot be done (inactive engine,
/// detached container, pass already running) and say so in the log.
pub fn update<S: Surface>(
    state: &mut WindowState,
    surface: &mut S,
    event: WindowEvent,
) -> Vec<WindowEffect> {
    let mut effects = Vec::new();
    match event {
        WindowEvent::Enable => enable(state, surface, &mut effects),
        WindowEvent::Disable => disable(state, surface, &mut effects),
        WindowEvent::Update(partial) => {
            disable(state, surface, &mut effects);
            state.options = state.options.merged(&partial);
            enable(state, surface, &mut effects);
        }
        WindowEvent::RehydrateAll => {
            let restored = match state.session.as_mut() {
                Some(session) => dehydrate::rehydrate_all(surface, &mut session.store),
                None => dehydrate::rehydrate_all(surface, &mut ItemStore::default()),
            };
            debug!(restored, "rehydrate all");
        }
        WindowEvent::ScrollToBottom => {
            if let Some(mut cx) = Cx::of(state, surface, &mut effects) {
                scroll::scroll_to_bottom(&mut cx);
            } else {
                scroll::pin(surface);
            }
        }
        WindowEvent::Timer(id) => {
            let Some(deferred) = state.timers.take(id) else {
                debug!(timer = id.0, "stale timer ignored");
                return effects;
            };
            if let Some(mut cx) = Cx::of(state, surface, &mut effects) {
                if cx.surface.is_connected() {
                    turn(&mut cx, |cx| run_deferred(cx, deferred));
                } else {
                    debug!(?deferred, "container detached; deferred work dropped");
                }
            }
        }
        WindowEvent::ItemEntered(id) => {
            if let Some(mut cx) = Cx::of(state, surface, &mut effects) {
                turn(&mut cx, |cx| windowing::on_enter(cx, id));
            }
        }
        WindowEvent::ItemLeft(id) => {
            if let Some(mut cx) = Cx::of(state, surface, &mut effects) {
                turn(&mut cx, |cx| windowing::on_leave(cx, id));
            }
        }
        WindowEvent::ChildrenChanged(mutation) => {
            if let Some(mut cx) = Cx::of(state, surface, &mut effects) {
                turn(&mut cx, |cx| detector::on_children_changed(cx, &mutation));
            }
        }
    }
    effects
}

fn enable<S: Surface>(state: &mut WindowState, surface: &mut S, effects: &mut Vec<WindowEffect>) {
    if state.is_enabled() {
        debug!("already enabled");
        return;
    }
    if !surface.is_connected() {
        warn!("transcript container not found; windowing stays inactive");
        return;
    }

    state.session = Some(Session::default());
    let total = surface.item_count();
    effects.push(WindowEffect::SetMargin {
        px: state.timings.margin_px(&state.options),
    });
    effects.push(WindowEffect::Observe {
        items: surface.item_ids(),
    });
    if total >= state.options.bulk_load_threshold {
        let delay = state.timings.startup_settle();
        state
            .timers
            .schedule(Deferred::StartupBulk, Wake::After(delay), effects);
    }
    info!(
        total,
        buffer_size = state.options.buffer_size,
        tail = state.options.always_visible_tail,
        threshold = state.options.bulk_load_threshold,
        "windowing enabled"
    );
}

fn disable<S: Surface>(state: &mut WindowState, surface: &mut S, effects: &mut Vec<WindowEffect>) {
    let Some(mut cx) = Cx::of(state, surface, effects) else {
        return;
    };
    dehydrate::abort_bulk(&mut cx);
    cx.timers.cancel_all(cx.effects);
    cx.effects.push(WindowEffect::UnobserveAll);
    let restored = dehydrate::rehydrate_all(cx.surface, &mut cx.session.store);
    state.session = None;
    info!(restored, "windowing disabled");
}

/// Runs one unit of work with markers reconciled against the tree first.
fn turn<S: Surface>(cx: &mut Cx<'_, S>, work: impl FnOnce(&mut Cx<'_, S>)) {
    let released = cx.session.store.reconcile(&*cx.surface);
    if released > 0 {
        debug!(released, "markers cleared externally; leaving them alone");
    }
    work(cx);
}

fn run_deferred<S: Surface>(cx: &mut Cx<'_, S>, deferred: Deferred) {
    match deferred {
        Deferred::Sweep => windowing::sweep(cx),
        Deferred::Settle => detector::settle(cx),
        Deferred::StartupBulk => {
            dehydrate::begin_bulk(cx, true);
        }
        Deferred::ChatSwitchReprocess => detector::reprocess(cx),
        Deferred::BulkCommit => dehydrate::commit_bulk(cx),
        Deferred::PinBottom => scroll::pin(cx.surface),
        Deferred::RevealLast => scroll::reveal_last(cx.surface),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::common::TimerId;
    use crate::config::{Options, Timings};
    use crate::item::ItemMarkers;
    use crate::surface::{ItemStyle, MemorySurface};

    fn loaded(items: usize) -> MemorySurface {
        let mut surface = MemorySurface::new(600.0);
        surface.push_items(vec![100.0; items]);
        surface.scroll_to_end();
        surface.drain_mutations();
        surface
    }

    fn scheduled(effects: &[WindowEffect]) -> Vec<TimerId> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                WindowEffect::Schedule { id, .. } => Some(*id),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_enable_observes_and_schedules_startup_pass() {
        let mut state = WindowState::new(Options::default(), Timings::default());
        let mut surface = loaded(12);

        let effects = update(&mut state, &mut surface, WindowEvent::Enable);

        assert!(state.is_enabled());
        assert_eq!(effects[0], WindowEffect::SetMargin { px: 500.0 });
        assert_eq!(
            effects[1],
            WindowEffect::Observe {
                items: surface.item_ids()
            }
        );
        assert!(matches!(
            effects[2],
            WindowEffect::Schedule {
                wake: Wake::After(delay),
                ..
            } if delay == Duration::from_millis(1500)
        ));
    }

    #[test]
    fn test_enable_is_idempotent() {
        let mut state = WindowState::new(Options::default(), Timings::default());
        let mut surface = loaded(3);
        update(&mut state, &mut surface, WindowEvent::Enable);

        assert!(update(&mut state, &mut surface, WindowEvent::Enable).is_empty());
    }

    #[test]
    fn test_stale_timer_is_ignored() {
        let mut state = WindowState::new(Options::default(), Timings::default());
        let mut surface = loaded(50);
        let effects = update(&mut state, &mut surface, WindowEvent::Enable);
        let startup = scheduled(&effects)[0];

        update(&mut state, &mut surface, WindowEvent::Disable);
        update(&mut state, &mut surface, WindowEvent::Enable);

        // The first session's startup timer fires late.
        let effects = update(&mut state, &mut surface, WindowEvent::Timer(startup));
        assert!(effects.is_empty());
        assert!(!state.session.as_ref().unwrap().processing.is_busy());
    }

    #[test]
    fn test_events_before_enable_do_nothing() {
        let mut state = WindowState::default();
        let mut surface = loaded(5);
        let ids = surface.item_ids();

        for event in [
            WindowEvent::ItemEntered(ids[0]),
            WindowEvent::ItemLeft(ids[0]),
            WindowEvent::Disable,
            WindowEvent::Timer(TimerId(0)),
        ] {
            assert!(update(&mut state, &mut surface, event).is_empty());
        }
        assert!(!state.is_enabled());
    }

    #[test]
    fn test_rehydrate_all_works_while_disabled() {
        let mut state = WindowState::default();
        let mut surface = loaded(4);
        let ids = surface.item_ids();
        surface.set_markers(ids[0], ItemMarkers::dehydrated(100.0));
        surface.set_style(ids[0], ItemStyle::placeholder(100.0));

        update(&mut state, &mut surface, WindowEvent::RehydrateAll);

        assert_eq!(surface.dehydrated_count(), 0);
        assert_eq!(surface.style(ids[0]), Some(ItemStyle::default()));
    }

    #[test]
    fn test_scroll_to_bottom_schedules_retry_chain() {
        let mut state = WindowState::new(Options::default(), Timings::default());
        let mut surface = loaded(5);
        update(&mut state, &mut surface, WindowEvent::Enable);

        let effects = update(&mut state, &mut surface, WindowEvent::ScrollToBottom);
        let wakes: Vec<Wake> = effects
            .iter()
            .filter_map(|effect| match effect {
                WindowEffect::Schedule { wake, .. } => Some(*wake),
                _ => None,
            })
            .collect();
        let ms = Duration::from_millis;
        assert_eq!(
            wakes,
            vec![
                Wake::Microtask,
                Wake::Frames(1),
                Wake::Frames(2),
                Wake::After(ms(50)),
                Wake::After(ms(200)),
                Wake::After(ms(500)),
                Wake::After(ms(800)),
                Wake::After(ms(800)),
            ]
        );

        // A second request replaces the first chain.
        let effects = update(&mut state, &mut surface, WindowEvent::ScrollToBottom);
        assert!(matches!(&effects[0], WindowEffect::Cancel { ids } if ids.len() == 8));
    }

    #[test]
    fn test_chat_switch_resets_tracking() {
        let mut state = WindowState::new(Options::default(), Timings::default());
        let mut surface = loaded(20);
        update(&mut state, &mut surface, WindowEvent::Enable);
        let old = surface.item_ids();
        update(&mut state, &mut surface, WindowEvent::ItemEntered(old[19]));

        let new = surface.replace_items(vec![100.0; 15]);
        let mutation = surface.drain_mutations().remove(0);
        let effects = update(&mut state, &mut surface, WindowEvent::ChildrenChanged(mutation));
        let settle = scheduled(&effects)[0];

        let effects = update(&mut state, &mut surface, WindowEvent::Timer(settle));
        assert!(effects.contains(&WindowEffect::UnobserveAll));
        assert!(effects.contains(&WindowEffect::Observe { items: new }));
        assert!(effects.iter().any(|effect| matches!(
            effect,
            WindowEffect::Schedule {
                wake: Wake::Frames(2),
                ..
            }
        )));
        assert!(state.visible_ids().is_empty());
    }
}
