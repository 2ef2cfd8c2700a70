//! Transcript windowing engine.
//!
//! Keeps a bounded working set of fully rendered items in a long, growing
//! transcript; everything else is collapsed to a placeholder of the same
//! height. The engine is a reducer over [`WindowEvent`]s that reads and
//! writes a [`Surface`] and returns [`WindowEffect`]s for a runtime to
//! schedule.

pub mod common;
pub mod config;
pub mod effects;
pub mod events;
pub mod item;
pub mod observe;
pub mod runtime;
pub mod state;
pub mod surface;
pub mod update;
pub mod windowing;

pub use config::{Config, Options, PartialOptions, Timings};
pub use effects::WindowEffect;
pub use events::WindowEvent;
pub use item::{ItemId, ItemMarkers};
pub use runtime::{RealtimeDriver, RealtimeHandle, SimRuntime};
pub use state::{WindowState, WindowStats};
pub use surface::{MemorySurface, Surface};
pub use update::update;
