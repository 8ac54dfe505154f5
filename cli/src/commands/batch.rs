//! `emufleet launch-all` / `emufleet stop-all`: fleet-wide lifecycle calls.
//!
//! Both exit with status 1 when any instance failed; skipped instances do
//! not count as failures.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Args;

use crate::app::{AppContext, build_controller};
use crate::application::batch::{BatchOrchestrator, LaunchAllOptions, StopAllOptions};
use crate::domain::batch::BatchResult;

/// Flags shared by both batch commands.
#[derive(Args)]
pub struct BatchFlags {
    /// Instances per batch (default: batch.max_concurrent)
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Seconds between batches (default: batch.delay)
    #[arg(long)]
    pub delay: Option<u64>,
}

#[derive(Args)]
pub struct LaunchAllArgs {
    /// Include instances that are already running (no-op if attached)
    #[arg(long)]
    pub all: bool,

    #[command(flatten)]
    pub batch: BatchFlags,
}

#[derive(Args)]
pub struct StopAllArgs {
    /// Also issue quit for instances already stopped
    #[arg(long)]
    pub all: bool,

    #[command(flatten)]
    pub batch: BatchFlags,
}

/// Run `emufleet launch-all`.
///
/// # Errors
///
/// Returns an error if the console cannot be enumerated.
pub async fn launch_all(app: &AppContext, args: &LaunchAllArgs) -> Result<ExitCode> {
    let config = app.load_config()?;
    let mut options = LaunchAllOptions::from_config(&config.batch);
    options.only_stopped = !args.all;
    if let Some(n) = args.batch.max_concurrent {
        options.max_concurrent = n.max(1);
    }
    if let Some(secs) = args.batch.delay {
        options.delay = Duration::from_secs(secs);
    }

    let orchestrator = BatchOrchestrator::new(build_controller(&config));
    let result = orchestrator.launch_all(&options, &app.reporter()).await?;
    finish(app, "launched", &result)
}

/// Run `emufleet stop-all`.
///
/// # Errors
///
/// Returns an error if the console cannot be enumerated.
pub async fn stop_all(app: &AppContext, args: &StopAllArgs) -> Result<ExitCode> {
    let config = app.load_config()?;
    let mut options = StopAllOptions::from_config(&config.batch);
    options.only_running = !args.all;
    if let Some(n) = args.batch.max_concurrent {
        options.max_concurrent = n.max(1);
    }
    if let Some(secs) = args.batch.delay {
        options.delay = Duration::from_secs(secs);
    }

    let orchestrator = BatchOrchestrator::new(build_controller(&config));
    let result = orchestrator.stop_all(&options, &app.reporter()).await?;
    finish(app, "stopped", &result)
}

fn finish(app: &AppContext, action: &str, result: &BatchResult) -> Result<ExitCode> {
    app.renderer().render_batch(action, result)?;
    Ok(if result.fail_count() == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
