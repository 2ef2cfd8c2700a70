//! Scroll Position Guardian.
//!
//! A single assignment of the bottom offset is unreliable while layout is
//! still catching up with new heights, so the assignment is repeated at
//! increasingly late points and finally the last item is scrolled into view.

use crate::common::{Deferred, TimerKind, Wake};
use crate::state::Cx;
use crate::surface::Surface;

pub(crate) fn scroll_to_bottom<S: Surface>(cx: &mut Cx<'_, S>) {
    cx.timers.cancel_kind(TimerKind::ScrollRetry, cx.effects);
    pin(cx.surface);

    let mut wakes = vec![Wake::Microtask, Wake::Frames(1), Wake::Frames(2)];
    wakes.extend(cx.timings.scroll_retries().map(Wake::After));
    for wake in wakes {
        cx.timers.schedule(Deferred::PinBottom, wake, cx.effects);
    }
    let fallback = cx.timings.reveal_fallback();
    cx.timers
        .schedule(Deferred::RevealLast, Wake::After(fallback), cx.effects);
}

pub fn pin<S: Surface>(surface: &mut S) {
    let bottom = surface.scroll_height();
    surface.set_scroll_top(bottom);
}

pub fn reveal_last<S: Surface>(surface: &mut S) {
    if let Some(last) = surface.item_ids().last().copied() {
        surface.scroll_into_view(last);
    }
}
