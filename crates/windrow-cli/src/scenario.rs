//! Simulation scenarios.
//!
//! A scenario is a list of steps, each either a host change to the
//! container, an engine operation, or a wait. Files are TOML:
//!
//! ```toml
//! [surface]
//! viewport = 600.0
//! item_height = 100.0
//!
//! [[step]]
//! op = "load"
//! count = 50
//!
//! [[step]]
//! op = "enable"
//!
//! [[step]]
//! op = "wait"
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use windrow_core::{ItemId, MemorySurface, Surface, WindowEvent};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SurfaceSetup {
    pub viewport: Option<f64>,
    pub item_height: Option<f64>,
    /// Nominal height reported for off-screen content, if set.
    pub lazy_paint: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
pub enum Step {
    /// Host's initial content: append and scroll to the end.
    Load {
        count: usize,
        height: Option<f64>,
    },
    /// New items streaming in.
    Append {
        count: usize,
        height: Option<f64>,
    },
    /// Replace every item (switch to another conversation).
    Switch {
        count: usize,
        height: Option<f64>,
    },
    /// Let time pass; without `ms`, until the engine is idle.
    Wait { ms: Option<u64> },
    /// User scroll to an absolute offset.
    Scroll { top: f64 },
    /// Toggle edit mode on the item at `index`.
    Edit {
        index: usize,
        #[serde(default = "default_editing")]
        editing: bool,
    },
    /// Another collaborator clears the marker of the item at `index`.
    Release { index: usize },
    RehydrateAll,
    ScrollToBottom,
    Disable,
    Enable,
}

fn default_editing() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub surface: SurfaceSetup,
    #[serde(rename = "step")]
    pub steps: Vec<Step>,
}

/// What a step asks the runner to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Host(HostOp),
    Engine(WindowEvent),
    Wait(Option<Duration>),
}

/// A change the host makes to the container.
#[derive(Debug, Clone, PartialEq)]
pub enum HostOp {
    Load { count: usize, height: f64 },
    Append { count: usize, height: f64 },
    Switch { count: usize, height: f64 },
    Scroll { top: f64 },
    Edit { index: usize, editing: bool },
    Release { index: usize },
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario from {}", path.display()))?;
        let scenario: Scenario = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse scenario from {}", path.display()))?;
        anyhow::ensure!(
            !scenario.steps.is_empty(),
            "scenario {} has no steps",
            path.display()
        );
        Ok(scenario)
    }

    /// Load, enable, stream a message in, switch conversations, scroll
    /// through history and back, then disable.
    pub fn builtin(items: usize) -> Self {
        Self {
            surface: SurfaceSetup::default(),
            steps: vec![
                Step::Load {
                    count: items,
                    height: None,
                },
                Step::Enable,
                Step::Wait { ms: None },
                Step::Append {
                    count: 1,
                    height: None,
                },
                Step::Wait { ms: None },
                Step::Switch {
                    count: items,
                    height: None,
                },
                Step::Wait { ms: None },
                Step::Scroll { top: 0.0 },
                Step::Wait { ms: None },
                Step::ScrollToBottom,
                Step::Wait { ms: None },
                Step::Disable,
            ],
        }
    }
}

impl Step {
    pub fn label(&self) -> String {
        match self {
            Step::Load { count, .. } => format!("load {count}"),
            Step::Append { count, .. } => format!("append {count}"),
            Step::Switch { count, .. } => format!("switch {count}"),
            Step::Wait { ms: Some(ms) } => format!("wait {ms}ms"),
            Step::Wait { ms: None } => "wait idle".to_string(),
            Step::Scroll { top } => format!("scroll {top}"),
            Step::Edit { index, editing } => format!("edit #{index} {editing}"),
            Step::Release { index } => format!("release #{index}"),
            Step::RehydrateAll => "rehydrate_all".to_string(),
            Step::ScrollToBottom => "scroll_to_bottom".to_string(),
            Step::Disable => "disable".to_string(),
            Step::Enable => "enable".to_string(),
        }
    }

    pub fn action(&self, item_height: f64) -> Action {
        let height = |h: &Option<f64>| h.unwrap_or(item_height);
        match self {
            Step::Load { count, height: h } => Action::Host(HostOp::Load {
                count: *count,
                height: height(h),
            }),
            Step::Append { count, height: h } => Action::Host(HostOp::Append {
                count: *count,
                height: height(h),
            }),
            Step::Switch { count, height: h } => Action::Host(HostOp::Switch {
                count: *count,
                height: height(h),
            }),
            Step::Wait { ms } => Action::Wait(ms.map(Duration::from_millis)),
            Step::Scroll { top } => Action::Host(HostOp::Scroll { top: *top }),
            Step::Edit { index, editing } => Action::Host(HostOp::Edit {
                index: *index,
                editing: *editing,
            }),
            Step::Release { index } => Action::Host(HostOp::Release { index: *index }),
            Step::RehydrateAll => Action::Engine(WindowEvent::RehydrateAll),
            Step::ScrollToBottom => Action::Engine(WindowEvent::ScrollToBottom),
            Step::Disable => Action::Engine(WindowEvent::Disable),
            Step::Enable => Action::Engine(WindowEvent::Enable),
        }
    }
}

impl HostOp {
    pub fn apply(self, surface: &mut MemorySurface) {
        let at = |surface: &MemorySurface, index: usize| -> Option<ItemId> {
            surface.item_ids().get(index).copied()
        };
        match self {
            HostOp::Load { count, height } => {
                surface.push_items(vec![height; count]);
                surface.scroll_to_end();
            }
            HostOp::Append { count, height } => {
                surface.push_items(vec![height; count]);
            }
            HostOp::Switch { count, height } => {
                surface.replace_items(vec![height; count]);
                surface.scroll_to_end();
            }
            HostOp::Scroll { top } => surface.scroll_to(top),
            HostOp::Edit { index, editing } => {
                if let Some(id) = at(surface, index) {
                    surface.set_editing(id, editing);
                }
            }
            HostOp::Release { index } => {
                if let Some(id) = at(surface, index) {
                    surface.clear_marker_externally(id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_parse_scenario_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scenario.toml");
        fs::write(
            &path,
            r#"
[surface]
viewport = 400.0

[[step]]
op = "load"
count = 20
height = 80.0

[[step]]
op = "enable"

[[step]]
op = "wait"
ms = 2000

[[step]]
op = "edit"
index = 3

[[step]]
op = "scroll_to_bottom"
"#,
        )
        .unwrap();

        let scenario = Scenario::load(&path).unwrap();
        assert_eq!(scenario.surface.viewport, Some(400.0));
        assert_eq!(
            scenario.steps,
            vec![
                Step::Load {
                    count: 20,
                    height: Some(80.0)
                },
                Step::Enable,
                Step::Wait { ms: Some(2000) },
                Step::Edit {
                    index: 3,
                    editing: true
                },
                Step::ScrollToBottom,
            ]
        );
    }

    #[test]
    fn test_unknown_op_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scenario.toml");
        fs::write(&path, "[[step]]\nop = \"explode\"\n").unwrap();

        let err = Scenario::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse scenario"));
    }

    #[test]
    fn test_step_heights_fall_back_to_default() {
        let step = Step::Append {
            count: 2,
            height: None,
        };
        assert_eq!(
            step.action(120.0),
            Action::Host(HostOp::Append {
                count: 2,
                height: 120.0
            })
        );
    }

    #[test]
    fn test_release_clears_marker() {
        let mut surface = MemorySurface::new(300.0);
        HostOp::Load {
            count: 3,
            height: 50.0,
        }
        .apply(&mut surface);
        let id = surface.item_ids()[1];
        surface.set_markers(id, windrow_core::ItemMarkers::dehydrated(50.0));

        HostOp::Release { index: 1 }.apply(&mut surface);
        assert!(!surface.is_dehydrated(id));
    }
}
