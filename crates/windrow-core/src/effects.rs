//! Window effect types.
//!
//! Effects are commands returned by the reducer that the runtime executes.
//! They cover scheduling and observation only: surface reads and writes
//! happen synchronously inside the reducer, the way a script touches the
//! element tree, while everything that must happen *later* is an effect.
//!
//! ## Cancellation Effects
//!
//! Cancellation is initiated from the reducer via `WindowEffect::Cancel`.
//! A runtime that cannot actually abort a wake-up may still deliver it; the
//! reducer ignores ids it no longer tracks, so late deliveries are harmless.

use crate::common::{TimerId, Wake};
use crate::item::ItemId;

/// Effects returned by the reducer for the runtime to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowEffect {
    /// Deliver `WindowEvent::Timer(id)` when `wake` is due.
    Schedule { id: TimerId, wake: Wake },

    /// Drop pending wake-ups.
    Cancel { ids: Vec<TimerId> },

    /// Start reporting intersection transitions for these items.
    Observe { items: Vec<ItemId> },

    /// Stop reporting transitions for every item.
    UnobserveAll,

    /// Margin (px) added around the viewport for intersection tests.
    SetMargin { px: f64 },
}
