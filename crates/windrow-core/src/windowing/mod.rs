//! Windowing algorithms.
//!
//! Each submodule operates on a borrowed [`Cx`](crate::state::Cx) for one
//! reducer turn; none of them hold state of their own.

mod budget;
pub mod dehydrate;
pub mod detector;
pub mod scroll;
mod visibility;

pub(crate) use budget::trim;
pub use dehydrate::{dehydrate, hydrate, keep_count, rehydrate_all};
pub use detector::{BurstKind, PendingBatch};
pub(crate) use visibility::{on_enter, on_leave, sweep};
