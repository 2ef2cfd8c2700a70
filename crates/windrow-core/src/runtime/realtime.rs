//! Real-time runtime on tokio.
//!
//! ## Inbox Pattern
//!
//! Everything that reaches the engine goes through one unbounded inbox:
//! - host commands from any number of [`RealtimeHandle`]s
//! - wake-ups from timer tasks, each a `tokio::time::sleep` raced against
//!   its own cancellation token
//!
//! Timer tokens are children of a per-session root token. Ending a session
//! cancels the root, so every outstanding sleep stops as a group even if a
//! `Cancel` effect was missed.

use std::collections::{HashMap, VecDeque};

use anyhow::{Context, Result, bail};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{Embedding, FRAME_DURATION};
use crate::common::{TimerId, Wake};
use crate::config::{Options, Timings};
use crate::effects::WindowEffect;
use crate::events::WindowEvent;
use crate::state::{WindowState, WindowStats};
use crate::surface::Surface;

/// Host-side requests to a running driver.
pub enum HostCommand<S> {
    /// Run an engine operation or forward an observation.
    Dispatch(WindowEvent),
    /// Change the container; child mutations are reported afterwards.
    Mutate(Box<dyn FnOnce(&mut S) + Send>),
    /// Snapshot the working set.
    Inspect(oneshot::Sender<WindowStats>),
    /// Stop the loop and hand state and surface back.
    Shutdown,
}

enum Inbox<S> {
    Host(HostCommand<S>),
    Fired(TimerId),
}

type InboxSender<S> = mpsc::UnboundedSender<Inbox<S>>;
type InboxReceiver<S> = mpsc::UnboundedReceiver<Inbox<S>>;

pub struct RealtimeDriver<S: Surface> {
    embedding: Embedding<S>,
    inbox_tx: InboxSender<S>,
    inbox_rx: InboxReceiver<S>,
    /// Parent of every timer token of the current session.
    session: CancellationToken,
    sleeps: HashMap<TimerId, CancellationToken>,
    microtasks: VecDeque<TimerId>,
    frame_waiters: Vec<(u64, TimerId)>,
    frame: u64,
}

/// Cloneable sender side of a driver's inbox.
pub struct RealtimeHandle<S> {
    tx: InboxSender<S>,
}

impl<S> Clone for RealtimeHandle<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<S: Surface + Send + 'static> RealtimeHandle<S> {
    pub fn dispatch(&self, event: WindowEvent) -> Result<()> {
        self.send(HostCommand::Dispatch(event))
    }

    pub fn mutate(&self, f: impl FnOnce(&mut S) + Send + 'static) -> Result<()> {
        self.send(HostCommand::Mutate(Box::new(f)))
    }

    pub async fn stats(&self) -> Result<WindowStats> {
        let (tx, rx) = oneshot::channel();
        self.send(HostCommand::Inspect(tx))?;
        rx.await.context("realtime driver dropped the inspection")
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(HostCommand::Shutdown)
    }

    fn send(&self, command: HostCommand<S>) -> Result<()> {
        if self.tx.send(Inbox::Host(command)).is_err() {
            bail!("realtime driver has stopped");
        }
        Ok(())
    }
}

impl<S: Surface + Send + 'static> RealtimeDriver<S> {
    pub fn new(options: Options, timings: Timings, surface: S) -> (Self, RealtimeHandle<S>) {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let handle = RealtimeHandle {
            tx: inbox_tx.clone(),
        };
        let driver = Self {
            embedding: Embedding::new(WindowState::new(options, timings), surface),
            inbox_tx,
            inbox_rx,
            session: CancellationToken::new(),
            sleeps: HashMap::new(),
            microtasks: VecDeque::new(),
            frame_waiters: Vec::new(),
            frame: 0,
        };
        (driver, handle)
    }

    /// Runs until `Shutdown`, then returns the final state and surface.
    pub async fn run(mut self) -> (WindowState, S) {
        let mut frames = tokio::time::interval(FRAME_DURATION);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                msg = self.inbox_rx.recv() => match msg {
                    Some(Inbox::Host(HostCommand::Shutdown)) | None => break,
                    Some(Inbox::Host(command)) => self.handle(command),
                    Some(Inbox::Fired(id)) => {
                        self.sleeps.remove(&id);
                        self.dispatch(WindowEvent::Timer(id));
                    }
                },
                _ = frames.tick() => self.run_frame(),
            }
        }

        self.session.cancel();
        debug!("realtime driver stopped");
        (self.embedding.state, self.embedding.surface)
    }

    fn handle(&mut self, command: HostCommand<S>) {
        match command {
            HostCommand::Dispatch(event) => self.dispatch(event),
            HostCommand::Mutate(f) => {
                f(&mut self.embedding.surface);
                for event in self.embedding.mutation_events() {
                    self.dispatch(event);
                }
            }
            HostCommand::Inspect(reply) => {
                let _ = reply.send(self.embedding.stats());
            }
            HostCommand::Shutdown => {}
        }
    }

    fn dispatch(&mut self, event: WindowEvent) {
        self.dispatch_one(event);
        while let Some(id) = self.microtasks.pop_front() {
            self.dispatch_one(WindowEvent::Timer(id));
        }
    }

    fn dispatch_one(&mut self, event: WindowEvent) {
        trace!(?event, "dispatch");
        let was_enabled = self.embedding.state.is_enabled();
        for effect in self.embedding.dispatch(event) {
            self.apply(effect);
        }
        if was_enabled && !self.embedding.state.is_enabled() {
            self.end_session();
        }
    }

    fn run_frame(&mut self) {
        self.frame += 1;
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

    fn apply(&mut self, effect: WindowEffect) {
        match effect {
            WindowEffect::Schedule { id, wake } => match wake {
                Wake::Microtask => self.microtasks.push_back(id),
                Wake::Frames(n) => self
                    .frame_waiters
                    .push((self.frame + u64::from(n.max(1)), id)),
                Wake::After(delay) => {
                    let token = self.session.child_token();
                    self.sleeps.insert(id, token.clone());
                    let tx = self.inbox_tx.clone();
                    tokio::spawn(async move {
                        tokio::select! {
                            () = token.cancelled() => {}
                            () = tokio::time::sleep(delay) => {
                                let _ = tx.send(Inbox::Fired(id));
                            }
                        }
                    });
                }
            },
            WindowEffect::Cancel { ids } => {
                for id in &ids {
                    if let Some(token) = self.sleeps.remove(id) {
                        token.cancel();
                    }
                }
                self.microtasks.retain(|id| !ids.contains(id));
                self.frame_waiters.retain(|(_, id)| !ids.contains(id));
            }
            // Observation effects are applied by the embedding.
            _ => {}
        }
    }

    /// Stops every outstanding sleep and starts a fresh token tree.
    fn end_session(&mut self) {
        self.session.cancel();
        self.session = CancellationToken::new();
        self.sleeps.clear();
        self.microtasks.clear();
        self.frame_waiters.clear();
    }
}
