//! Tracing subscriber setup.
//!
//! Filter comes from `WINDROW_LOG`, falling back to `log.level` in the
//! config. Output goes to `$WINDROW_HOME/logs/windrow.log` unless stderr is
//! requested.

use std::fs;

use anyhow::{Context, Result};
use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use windrow_core::config::{LogConfig, paths};

const LOG_ENV: &str = "WINDROW_LOG";
const LOG_FILE: &str = "windrow.log";

pub fn init(config: &LogConfig, to_stderr: bool) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("invalid log filter '{}'", config.level))?;

    if to_stderr {
        tracing_subscriber::registry()
            .with(
                fmt::Layer::new()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .with(filter)
            .try_init()
            .context("install stderr subscriber")?;
        return Ok(());
    }

    let dir = paths::logs_dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    let appender = rolling::never(&dir, LOG_FILE);

    tracing_subscriber::registry()
        .with(
            fmt::Layer::new()
                .with_writer(appender)
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true),
        )
        .with(filter)
        .try_init()
        .context("install file subscriber")?;

    tracing::debug!(path = %dir.join(LOG_FILE).display(), "tracing initialized");
    Ok(())
}
