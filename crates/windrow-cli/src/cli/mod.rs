//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use windrow_core::config;

use crate::logging;

mod commands;

#[derive(Parser)]
#[command(name = "windrow")]
#[command(version)]
#[command(about = "Transcript windowing engine: configuration and simulation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Write logs to stderr instead of $WINDROW_HOME/logs/windrow.log
    #[arg(long, global = true)]
    log_stderr: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Drive the engine through a scenario and report the working set
    Simulate(SimulateArgs),
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Generate a fresh config from Rust defaults (for xtask)
    Generate,
}

#[derive(clap::Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Scenario file (TOML); the built-in scenario is used when omitted
    #[arg(long, value_name = "FILE")]
    pub scenario: Option<PathBuf>,

    /// Items in the built-in scenario
    #[arg(long, value_name = "N", default_value_t = 50)]
    pub items: usize,

    /// Viewport height in px
    #[arg(long, value_name = "PX")]
    pub viewport: Option<f64>,

    /// Natural height of every item in px
    #[arg(long = "item-height", value_name = "PX")]
    pub item_height: Option<f64>,

    /// Override options.buffer_size
    #[arg(long = "buffer-size", value_name = "B")]
    pub buffer_size: Option<usize>,

    /// Override options.always_visible_tail
    #[arg(long, value_name = "T")]
    pub tail: Option<usize>,

    /// Override options.bulk_load_threshold
    #[arg(long, value_name = "K")]
    pub threshold: Option<usize>,

    /// Run on the tokio clock instead of the simulated one
    #[arg(long)]
    pub realtime: bool,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let Cli {
        command,
        log_stderr,
    } = cli;

    match command {
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::Generate => commands::config::generate(),
        },

        Commands::Simulate(args) => {
            let config = config::Config::load().context("load config")?;
            logging::init(&config.log, log_stderr).context("init logging")?;
            commands::simulate::run(&config, &args).await
        }
    }
}
