//! `windrow simulate`: drive the engine over an in-memory transcript and
//! report the working set after every step.

use std::time::Duration;

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, Table};
use serde::Serialize;
use tokio::time::{Instant, sleep};
use tracing::info;
use windrow_core::config::Config;
use windrow_core::runtime::FRAME_DURATION;
use windrow_core::{
    MemorySurface, Options, PartialOptions, RealtimeDriver, RealtimeHandle, SimRuntime, Timings,
    WindowStats,
};

use crate::cli::SimulateArgs;
use crate::scenario::{Action, Scenario};

const DEFAULT_VIEWPORT_PX: f64 = 600.0;
const DEFAULT_ITEM_HEIGHT_PX: f64 = 100.0;
/// Wall-clock cap for an idle wait on the realtime driver.
const REALTIME_IDLE_LIMIT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize)]
struct Row {
    step: String,
    at_ms: u128,
    #[serde(flatten)]
    stats: WindowStats,
}

pub async fn run(config: &Config, args: &SimulateArgs) -> Result<()> {
    let scenario = match &args.scenario {
        Some(path) => Scenario::load(path)?,
        None => Scenario::builtin(args.items),
    };

    let options = config.options.merged(&PartialOptions {
        buffer_size: args.buffer_size,
        always_visible_tail: args.tail,
        bulk_load_threshold: args.threshold,
    });
    let viewport = args
        .viewport
        .or(scenario.surface.viewport)
        .unwrap_or(DEFAULT_VIEWPORT_PX);
    let item_height = args
        .item_height
        .or(scenario.surface.item_height)
        .unwrap_or(DEFAULT_ITEM_HEIGHT_PX);

    let mut surface = MemorySurface::new(viewport);
    if let Some(nominal) = scenario.surface.lazy_paint {
        surface = surface.with_lazy_paint(nominal);
    }

    info!(
        steps = scenario.steps.len(),
        viewport,
        item_height,
        realtime = args.realtime,
        "simulate"
    );

    let rows = if args.realtime {
        run_realtime(options, config.timings.clone(), surface, &scenario, item_height).await?
    } else {
        run_sim(options, config.timings.clone(), surface, &scenario, item_height)
    };

    if args.json {
        let json = serde_json::to_string_pretty(&rows).context("serialize rows")?;
        println!("{json}");
    } else {
        println!("{}", render(&rows));
    }
    Ok(())
}

fn run_sim(
    options: Options,
    timings: Timings,
    surface: MemorySurface,
    scenario: &Scenario,
    item_height: f64,
) -> Vec<Row> {
    let mut sim = SimRuntime::new(options, timings, surface);
    let mut rows = Vec::with_capacity(scenario.steps.len());

    for step in &scenario.steps {
        match step.action(item_height) {
            Action::Host(op) => sim.host(|surface| op.apply(surface)),
            Action::Engine(event) => sim.dispatch(event),
            Action::Wait(Some(by)) => sim.advance(by),
            Action::Wait(None) => sim.run_until_idle(),
        }
        rows.push(Row {
            step: step.label(),
            at_ms: sim.now().as_millis(),
            stats: sim.stats(),
        });
    }
    rows
}

async fn run_realtime(
    options: Options,
    timings: Timings,
    surface: MemorySurface,
    scenario: &Scenario,
    item_height: f64,
) -> Result<Vec<Row>> {
    let (driver, handle) = RealtimeDriver::new(options, timings, surface);
    let task = tokio::spawn(driver.run());
    let started = Instant::now();
    let mut rows = Vec::with_capacity(scenario.steps.len());

    for step in &scenario.steps {
        match step.action(item_height) {
            Action::Host(op) => handle.mutate(move |surface| op.apply(surface))?,
            Action::Engine(event) => handle.dispatch(event)?,
            Action::Wait(Some(by)) => sleep(by).await,
            Action::Wait(None) => wait_idle(&handle).await?,
        }
        rows.push(Row {
            step: step.label(),
            at_ms: started.elapsed().as_millis(),
            stats: handle.stats().await?,
        });
    }

    handle.shutdown()?;
    task.await.context("realtime driver panicked")?;
    Ok(rows)
}

/// Waits until two consecutive frames see no timers, no bulk pass and no
/// change in the working set.
async fn wait_idle(handle: &RealtimeHandle<MemorySurface>) -> Result<()> {
    let deadline = Instant::now() + REALTIME_IDLE_LIMIT;
    let mut previous = handle.stats().await?;
    let mut quiet_frames = 0;
    while quiet_frames < 2 && Instant::now() < deadline {
        sleep(FRAME_DURATION * 2).await;
        let current = handle.stats().await?;
        if current.pending_timers == 0 && !current.processing && current == previous {
            quiet_frames += 1;
        } else {
            quiet_frames = 0;
        }
        previous = current;
    }
    Ok(())
}

fn render(rows: &[Row]) -> Table {
    let mut table = Table::new();
    table.set_header(
        [
            "Step",
            "At (ms)",
            "Enabled",
            "Total",
            "Hydrated",
            "Dehydrated",
            "Visible",
            "Timers",
            "At bottom",
        ]
        .map(|h| Cell::new(h).fg(Color::Green)),
    );
    for row in rows {
        let stats = &row.stats;
        table.add_row(vec![
            Cell::new(&row.step),
            Cell::new(row.at_ms),
            Cell::new(yes_no(stats.enabled)),
            Cell::new(stats.total),
            Cell::new(stats.hydrated),
            Cell::new(stats.dehydrated),
            Cell::new(stats.visible),
            Cell::new(stats.pending_timers),
            Cell::new(yes_no(stats.at_bottom)),
        ]);
    }
    table
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
