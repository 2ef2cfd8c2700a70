mod timer;

pub use timer::{Deferred, TimerId, TimerKind, TimerSeq, Timers, Wake};
