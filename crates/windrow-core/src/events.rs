//! Inputs to the reducer.

use crate::common::TimerId;
use crate::config::PartialOptions;
use crate::item::ItemId;
use crate::surface::ChildMutation;

#[derive(Debug, Clone, PartialEq)]
pub enum WindowEvent {
    /// Start a windowing session on the current container.
    Enable,
    /// Tear the session down and restore every item.
    Disable,
    /// Apply new options (disable, merge, enable).
    Update(PartialOptions),
    /// Restore every item without ending the session (e.g. before export).
    RehydrateAll,
    /// Pin the viewport to the end of the transcript.
    ScrollToBottom,

    /// An item entered the viewport margin.
    ItemEntered(ItemId),
    /// An item left the viewport margin.
    ItemLeft(ItemId),
    /// Items were added to or removed from the container.
    ChildrenChanged(ChildMutation),

    /// A scheduled wake-up is due.
    Timer(TimerId),
}
