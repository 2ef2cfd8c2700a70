use std::collections::BTreeMap;
use std::time::Duration;

use crate::effects::WindowEffect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

#[derive(Debug, Default)]
pub struct TimerSeq {
    next: u64,
}

impl TimerSeq {
    pub fn next_id(&mut self) -> TimerId {
        let id = TimerId(self.next);
        self.next = self.next.wrapping_add(1);
        id
    }
}

/// When a deferred callback becomes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// After the current turn, before any timer or frame.
    Microtask,
    /// On the n-th upcoming render-frame boundary.
    Frames(u8),
    /// After a fixed delay.
    After(Duration),
}

/// Deferred work requested by the reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferred {
    /// Dehydrate items that left the margin during the debounce window.
    Sweep,
    /// Classify the accumulated container mutations.
    Settle,
    /// Bulk pass after the host's first paint on activation.
    StartupBulk,
    /// Reprocess a replaced item set once the host has laid it out.
    ChatSwitchReprocess,
    /// Write phase of an in-flight bulk pass.
    BulkCommit,
    /// One attempt of the bottom-pinning chain.
    PinBottom,
    /// Final attempt: bring the last item fully into view.
    RevealLast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Sweep,
    Settle,
    Startup,
    ChatSwitch,
    BulkCommit,
    ScrollRetry,
}

impl Deferred {
    pub fn kind(self) -> TimerKind {
        match self {
            Deferred::Sweep => TimerKind::Sweep,
            Deferred::Settle => TimerKind::Settle,
            Deferred::StartupBulk => TimerKind::Startup,
            Deferred::ChatSwitchReprocess => TimerKind::ChatSwitch,
            Deferred::BulkCommit => TimerKind::BulkCommit,
            Deferred::PinBottom | Deferred::RevealLast => TimerKind::ScrollRetry,
        }
    }
}

/// Pending timers (stored in `WindowState`, mutated only by the reducer).
///
/// The sequence survives disable/enable cycles so a wake-up delivered late by
/// a runtime can never be mistaken for a timer of the current session.
#[derive(Debug, Default)]
pub struct Timers {
    seq: TimerSeq,
    pending: BTreeMap<TimerId, Deferred>,
}

impl Timers {
    pub fn schedule(
        &mut self,
        deferred: Deferred,
        wake: Wake,
        effects: &mut Vec<WindowEffect>,
    ) -> TimerId {
        let id = self.seq.next_id();
        self.pending.insert(id, deferred);
        effects.push(WindowEffect::Schedule { id, wake });
        id
    }

    /// Cancels every pending timer of one kind.
    pub fn cancel_kind(&mut self, kind: TimerKind, effects: &mut Vec<WindowEffect>) {
        let ids: Vec<TimerId> = self
            .pending
            .iter()
            .filter(|(_, deferred)| deferred.kind() == kind)
            .map(|(id, _)| *id)
            .collect();
        if ids.is_empty() {
            return;
        }
        for id in &ids {
            self.pending.remove(id);
        }
        effects.push(WindowEffect::Cancel { ids });
    }

    pub fn cancel_all(&mut self, effects: &mut Vec<WindowEffect>) {
        if self.pending.is_empty() {
            return;
        }
        let ids = std::mem::take(&mut self.pending).into_keys().collect();
        effects.push(WindowEffect::Cancel { ids });
    }

    /// Claims a fired timer. Returns `None` for cancelled or unknown ids.
    pub fn take(&mut self, id: TimerId) -> Option<Deferred> {
        self.pending.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_kind_leaves_other_kinds() {
        let mut timers = Timers::default();
        let mut effects = Vec::new();
        let debounce = Wake::After(Duration::from_millis(200));
        let sweep = timers.schedule(Deferred::Sweep, debounce, &mut effects);
        let pin = timers.schedule(Deferred::PinBottom, Wake::Microtask, &mut effects);
        let reveal = timers.schedule(Deferred::RevealLast, Wake::Frames(1), &mut effects);

        effects.clear();
        timers.cancel_kind(TimerKind::ScrollRetry, &mut effects);

        assert_eq!(
            effects,
            vec![WindowEffect::Cancel {
                ids: vec![pin, reveal]
            }]
        );
        assert_eq!(timers.take(sweep), Some(Deferred::Sweep));
        assert_eq!(timers.take(pin), None);
    }

    #[test]
    fn test_cancel_kind_without_match_emits_nothing() {
        let mut timers = Timers::default();
        let mut effects = Vec::new();
        timers.cancel_kind(TimerKind::Settle, &mut effects);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_ids_are_not_reused_after_cancel_all() {
        let mut timers = Timers::default();
        let mut effects = Vec::new();
        let first = timers.schedule(Deferred::Settle, Wake::Microtask, &mut effects);
        timers.cancel_all(&mut effects);
        let second = timers.schedule(Deferred::Settle, Wake::Microtask, &mut effects);

        assert_ne!(first, second);
        assert_eq!(timers.take(first), None);
        assert_eq!(timers.take(second), Some(Deferred::Settle));
    }
}
