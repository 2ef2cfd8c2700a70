//! Runtimes: own the surface and state, execute effects, feed events back.
//!
//! This is the boundary where deferred work actually gets deferred. The
//! reducer only says *when* a timer is due; a runtime decides what "next
//! microtask", "next frame" and "after 200ms" mean.
//!
//! - `sim.rs`: deterministic virtual clock for tests and the simulator
//! - `realtime.rs`: tokio event loop with an inbox and cancellable sleeps

mod realtime;
mod sim;

use std::time::Duration;

pub use realtime::{HostCommand, RealtimeDriver, RealtimeHandle};
pub use sim::SimRuntime;

use crate::effects::WindowEffect;
use crate::events::WindowEvent;
use crate::observe::IntersectionTracker;
use crate::state::{WindowState, WindowStats};
use crate::surface::Surface;
use crate::update;

/// One render frame (60fps).
pub const FRAME_DURATION: Duration = Duration::from_millis(16);

/// State, surface and intersection tracking shared by both runtimes.
#[derive(Debug)]
pub(crate) struct Embedding<S: Surface> {
    pub state: WindowState,
    pub surface: S,
    pub tracker: IntersectionTracker,
}

impl<S: Surface> Embedding<S> {
    /// Starts from the surface as it is: mutations recorded before the
    /// engine existed are the initial content, not a burst to classify.
    pub fn new(state: WindowState, mut surface: S) -> Self {
        surface.drain_mutations();
        Self {
            state,
            surface,
            tracker: IntersectionTracker::default(),
        }
    }

    /// Runs the reducer and applies observation effects in place.
    ///
    /// Returns only the scheduling effects, which depend on the runtime.
    pub fn dispatch(&mut self, event: WindowEvent) -> Vec<WindowEffect> {
        let effects = update::update(&mut self.state, &mut self.surface, event);
        let mut scheduling = Vec::new();
        for effect in effects {
            match effect {
                WindowEffect::Observe { items } => self.tracker.observe(items),
                WindowEffect::UnobserveAll => self.tracker.unobserve_all(),
                WindowEffect::SetMargin { px } => self.tracker.set_margin(px),
                WindowEffect::Schedule { .. } | WindowEffect::Cancel { .. } => {
                    scheduling.push(effect);
                }
            }
        }
        scheduling
    }

    /// Child mutations since the last call, as reducer events.
    pub fn mutation_events(&mut self) -> Vec<WindowEvent> {
        self.surface
            .drain_mutations()
            .into_iter()
            .map(WindowEvent::ChildrenChanged)
            .collect()
    }

    /// Layout settles, then intersections are recomputed.
    pub fn end_frame(&mut self) -> Vec<WindowEvent> {
        self.surface.end_frame();
        self.tracker.poll(&self.surface)
    }

    pub fn stats(&self) -> WindowStats {
        self.state.stats(&self.surface)
    }
}
