//! Configuration for windrow.
//!
//! Loads configuration from ${WINDROW_HOME}/config.toml with sensible defaults.
//! Engine options and heuristic timings live here as named, overridable values.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use toml_edit::{DocumentMut, Item, Table};

/// Windowing options, immutable during one enabled session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Margin around the viewport, in buffer units.
    pub buffer_size: usize,
    /// Most recent items that always stay hydrated.
    pub always_visible_tail: usize,
    /// Items added in one burst that count as a bulk load.
    pub bulk_load_threshold: usize,
}

impl Options {
    const DEFAULT_BUFFER_SIZE: usize = 2;
    const DEFAULT_ALWAYS_VISIBLE_TAIL: usize = 3;
    const DEFAULT_BULK_LOAD_THRESHOLD: usize = 10;

    /// Applies a partial update. The bulk threshold never drops below 1.
    #[must_use]
    pub fn merged(self, partial: &PartialOptions) -> Self {
        Self {
            buffer_size: partial.buffer_size.unwrap_or(self.buffer_size),
            always_visible_tail: partial
                .always_visible_tail
                .unwrap_or(self.always_visible_tail),
            bulk_load_threshold: partial
                .bulk_load_threshold
                .unwrap_or(self.bulk_load_threshold)
                .max(1),
        }
    }

    /// Hydrated items allowed in steady state.
    pub fn max_hydrated(&self) -> usize {
        self.always_visible_tail + 2 * self.buffer_size
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            buffer_size: Self::DEFAULT_BUFFER_SIZE,
            always_visible_tail: Self::DEFAULT_ALWAYS_VISIBLE_TAIL,
            bulk_load_threshold: Self::DEFAULT_BULK_LOAD_THRESHOLD,
        }
    }
}

/// Subset of [`Options`] for `update`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialOptions {
    pub buffer_size: Option<usize>,
    pub always_visible_tail: Option<usize>,
    pub bulk_load_threshold: Option<usize>,
}

/// Heuristic constants. Tuned empirically for chat transcripts; there is no
/// principled derivation, so they stay overridable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Pixels per buffer unit.
    pub buffer_unit_px: f64,
    /// Height assumed per item when estimating how many fit the viewport.
    pub estimated_item_height_px: f64,
    /// Debounce window for classifying container mutations.
    pub settle_window_ms: u64,
    /// Debounce for dehydrating items that left the margin.
    pub sweep_debounce_ms: u64,
    /// Delay before the first bulk pass, letting the host finish its own
    /// first paint and scroll-to-end.
    pub startup_settle_ms: u64,
    /// Frame boundaries to wait after a chat switch before reprocessing.
    pub chat_switch_frames: u8,
    /// Delayed attempts of the bottom-pinning chain.
    pub scroll_retry_ms: Vec<u64>,
    /// Delay of the final scroll-into-view fallback.
    pub reveal_fallback_ms: u64,
}

impl Timings {
    const DEFAULT_BUFFER_UNIT_PX: f64 = 250.0;
    const DEFAULT_ESTIMATED_ITEM_HEIGHT_PX: f64 = 150.0;
    const DEFAULT_SETTLE_WINDOW_MS: u64 = 150;
    const DEFAULT_SWEEP_DEBOUNCE_MS: u64 = 200;
    const DEFAULT_STARTUP_SETTLE_MS: u64 = 1500;
    const DEFAULT_CHAT_SWITCH_FRAMES: u8 = 2;
    const DEFAULT_SCROLL_RETRY_MS: [u64; 4] = [50, 200, 500, 800];
    const DEFAULT_REVEAL_FALLBACK_MS: u64 = 800;

    pub fn settle_window(&self) -> Duration {
        Duration::from_millis(self.settle_window_ms)
    }

    pub fn sweep_debounce(&self) -> Duration {
        Duration::from_millis(self.sweep_debounce_ms)
    }

    pub fn startup_settle(&self) -> Duration {
        Duration::from_millis(self.startup_settle_ms)
    }

    pub fn scroll_retries(&self) -> impl Iterator<Item = Duration> + '_ {
        self.scroll_retry_ms.iter().map(|ms| Duration::from_millis(*ms))
    }

    pub fn reveal_fallback(&self) -> Duration {
        Duration::from_millis(self.reveal_fallback_ms)
    }

    /// Intersection margin for the given options.
    pub fn margin_px(&self, options: &Options) -> f64 {
        options.buffer_size as f64 * self.buffer_unit_px
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            buffer_unit_px: Self::DEFAULT_BUFFER_UNIT_PX,
            estimated_item_height_px: Self::DEFAULT_ESTIMATED_ITEM_HEIGHT_PX,
            settle_window_ms: Self::DEFAULT_SETTLE_WINDOW_MS,
            sweep_debounce_ms: Self::DEFAULT_SWEEP_DEBOUNCE_MS,
            startup_settle_ms: Self::DEFAULT_STARTUP_SETTLE_MS,
            chat_switch_frames: Self::DEFAULT_CHAT_SWITCH_FRAMES,
            scroll_retry_ms: Self::DEFAULT_SCROLL_RETRY_MS.to_vec(),
            reveal_fallback_ms: Self::DEFAULT_REVEAL_FALLBACK_MS,
        }
    }
}

/// Logging configuration (used by the CLI subscriber).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive when `WINDROW_LOG` is unset.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

pub mod paths {
    //! Path resolution for windrow configuration and data directories.
    //!
    //! WINDROW_HOME resolution order:
    //! 1. WINDROW_HOME environment variable (if set)
    //! 2. ~/.config/windrow (default)
    //! 3. ./.windrow when no home directory can be determined

    use std::path::PathBuf;

    /// Returns the windrow home directory.
    pub fn windrow_home() -> PathBuf {
        if let Ok(home) = std::env::var("WINDROW_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".windrow"),
            |h| h.join(".config").join("windrow"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        windrow_home().join("config.toml")
    }

    /// Returns the directory log files are written to.
    pub fn logs_dir() -> PathBuf {
        windrow_home().join("logs")
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Windowing options.
    pub options: Options,

    /// Heuristic timings.
    pub timings: Timings,

    /// Logging.
    pub log: LogConfig,
}

fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

impl Config {
    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))?
        } else {
            Config::default()
        };
        config
            .validate()
            .with_context(|| format!("Invalid config at {}", path.display()))?;
        Ok(config)
    }

    /// Checks value ranges serde cannot express.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.options.bulk_load_threshold >= 1,
            "options.bulk_load_threshold must be at least 1"
        );
        let t = &self.timings;
        anyhow::ensure!(
            t.buffer_unit_px.is_finite() && t.buffer_unit_px >= 0.0,
            "timings.buffer_unit_px must be a non-negative number"
        );
        anyhow::ensure!(
            t.estimated_item_height_px.is_finite() && t.estimated_item_height_px > 0.0,
            "timings.estimated_item_height_px must be positive"
        );
        Ok(())
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Renders `Config::default()` into the commented template.
    ///
    /// Comments, key order and layout come from `default_config.toml`; every
    /// value comes from the Rust defaults. `xtask update-default-config`
    /// writes the result back over the template.
    pub fn generate() -> Result<String> {
        let defaults = toml::to_string(&Config::default())
            .context("Failed to serialize default config to TOML")?
            .parse::<DocumentMut>()
            .context("Failed to parse serialized defaults")?;
        let mut rendered = default_config_template()
            .parse::<DocumentMut>()
            .context("Failed to parse default config template")?;

        overlay_defaults(rendered.as_table_mut(), defaults.as_table());
        Ok(rendered.to_string())
    }

    /// Writes `content` next to `path` first, then renames it into place.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }

        let staged = path.with_extension("toml.tmp");
        fs::write(&staged, content)
            .with_context(|| format!("Failed to write config to {}", staged.display()))?;
        fs::rename(&staged, path).with_context(|| {
            format!("Failed to move {} into {}", staged.display(), path.display())
        })
    }
}

/// Copies every value of `defaults` into `template`, recursing into tables
/// both sides share. Template values keep their inline decoration; keys the
/// template lacks are appended.
fn overlay_defaults(template: &mut Table, defaults: &Table) {
    for (key, item) in defaults.iter() {
        match item {
            Item::None => {}
            Item::Table(section) if template.get(key).is_some_and(Item::is_table) => {
                if let Some(Item::Table(existing)) = template.get_mut(key) {
                    overlay_defaults(existing, section);
                }
            }
            Item::Value(value) if template.get(key).is_some_and(Item::is_value) => {
                if let Some(Item::Value(existing)) = template.get_mut(key) {
                    let decor = existing.decor().clone();
                    *existing = value.clone();
                    *existing.decor_mut() = decor;
                }
            }
            _ => {
                template.insert(key, item.clone());
            }
        }
    }
}
