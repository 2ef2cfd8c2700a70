//! Deterministic runtime on a virtual clock.
//!
//! Ordering rules:
//! - microtasks drain after every dispatched event, before anything else
//! - frame boundaries every [`FRAME_DURATION`]: frame waiters run first, then
//!   layout settles, then intersections are polled
//! - delayed timers fire in deadline order, FIFO on equal deadlines, and
//!   before a frame boundary that falls on the same instant

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use tracing::trace;

use super::{Embedding, FRAME_DURATION};
use crate::common::{TimerId, Wake};
use crate::config::{Options, PartialOptions, Timings};
use crate::effects::WindowEffect;
use crate::events::WindowEvent;
use crate::state::{WindowState, WindowStats};
use crate::surface::Surface;

/// Upper bound on virtual time spent by [`SimRuntime::run_until_idle`].
const IDLE_LIMIT: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct SimRuntime<S: Surface> {
    embedding: Embedding<S>,
    now: Duration,
    next_frame: Duration,
    frame: u64,
    microtasks: VecDeque<TimerId>,
    /// (frame index due, id), in scheduling order.
    frame_waiters: Vec<(u64, TimerId)>,
    /// Keyed by (deadline, insertion order).
    delayed: BTreeMap<(Duration, u64), TimerId>,
    insertions: u64,
}

impl<S: Surface> SimRuntime<S> {
    pub fn new(options: Options, timings: Timings, surface: S) -> Self {
        Self {
            embedding: Embedding::new(WindowState::new(options, timings), surface),
            now: Duration::ZERO,
            next_frame: FRAME_DURATION,
            frame: 0,
            microtasks: VecDeque::new(),
            frame_waiters: Vec::new(),
            delayed: BTreeMap::new(),
            insertions: 0,
        }
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn state(&self) -> &WindowState {
        &self.embedding.state
    }

    pub fn surface(&self) -> &S {
        &self.embedding.surface
    }

    pub fn stats(&self) -> WindowStats {
        self.embedding.stats()
    }

    /// Dispatches an event and drains the microtasks it queued.
    pub fn dispatch(&mut self, event: WindowEvent) {
        self.dispatch_one(event);
        while let Some(id) = self.microtasks.pop_front() {
            self.dispatch_one(WindowEvent::Timer(id));
        }
    }

    /// Mutates the surface as the host would, then reports child mutations.
    pub fn host<R>(&mut self, f: impl FnOnce(&mut S) -> R) -> R {
        let out = f(&mut self.embedding.surface);
        for event in self.embedding.mutation_events() {
            self.dispatch(event);
        }
        out
    }

    pub fn enable(&mut self) {
        self.dispatch(WindowEvent::Enable);
    }

    pub fn disable(&mut self) {
        self.dispatch(WindowEvent::Disable);
    }

    pub fn update(&mut self, partial: PartialOptions) {
        self.dispatch(WindowEvent::Update(partial));
    }

    pub fn rehydrate_all(&mut self) {
        self.dispatch(WindowEvent::RehydrateAll);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.dispatch(WindowEvent::ScrollToBottom);
    }

    pub fn has_pending(&self) -> bool {
        !self.microtasks.is_empty() || !self.frame_waiters.is_empty() || !self.delayed.is_empty()
    }

    /// Advances virtual time, firing timers and frames on the way.
    pub fn advance(&mut self, by: Duration) {
        let target = self.now + by;
        loop {
            let timer_due = self
                .delayed
                .first_key_value()
                .map(|((deadline, _), _)| *deadline)
                .filter(|deadline| *deadline <= target);
            match timer_due {
                Some(deadline) if deadline <= self.next_frame => {
                    self.now = deadline;
                    if let Some((_, id)) = self.delayed.pop_first() {
                        self.dispatch(WindowEvent::Timer(id));
                    }
                }
                _ if self.next_frame <= target => {
                    self.now = self.next_frame;
                    self.run_frame();
                }
                _ => break,
            }
        }
        self.now = target;
    }

    /// Runs frames until nothing is pending and a frame passes quietly.
    pub fn run_until_idle(&mut self) {
        let limit = self.now + IDLE_LIMIT;
        let mut quiet_frames = 0;
        while self.now < limit && quiet_frames < 2 {
            let before = self.stats();
            let pending = self.has_pending();
            self.advance(FRAME_DURATION);
            if !pending && !self.has_pending() && self.stats() == before {
                quiet_frames += 1;
            } else {
                quiet_frames = 0;
            }
        }
    }

    fn run_frame(&mut self) {
        self.frame += 1;
        self.next_frame += FRAME_DURATION;

        let frame = self.frame;
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.frame_waiters)
            .into_iter()
            .partition(|(at, _)| *at <= frame);
        self.frame_waiters = waiting;
        for (_, id) in due {
            self.dispatch(WindowEvent::Timer(id));
        }

        for event in self.embedding.end_frame() {
            self.dispatch(event);
        }
    }

    fn dispatch_one(&mut self, event: WindowEvent) {
        trace!(?event, at = ?self.now, "dispatch");
        for effect in self.embedding.dispatch(event) {
            self.apply(effect);
        }
    }

    fn apply(&mut self, effect: WindowEffect) {
        match effect {
            WindowEffect::Schedule { id, wake } => match wake {
                Wake::Microtask => self.microtasks.push_back(id),
                Wake::Frames(n) => self
                    .frame_waiters
                    .push((self.frame + u64::from(n.max(1)), id)),
                Wake::After(delay) => {
                    self.insertions += 1;
                    self.delayed.insert((self.now + delay, self.insertions), id);
                }
            },
            WindowEffect::Cancel { ids } => {
                self.microtasks.retain(|id| !ids.contains(id));
                self.frame_waiters.retain(|(_, id)| !ids.contains(id));
                self.delayed.retain(|_, id| !ids.contains(id));
            }
            // Observation effects are applied by the embedding.
            _ => {}
        }
    }
}
