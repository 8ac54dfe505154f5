//! `emufleet stop <name>`: quit an instance, releasing its bridge port.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::commands::with_spinner;

#[derive(Args)]
pub struct StopArgs {
    /// Instance name
    pub name: String,

    /// Do not press HOME before quitting
    #[arg(long)]
    pub no_cleanup: bool,

    /// Seconds to wait for the console to confirm (default: timeouts.stop)
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Run `emufleet stop`.
///
/// # Errors
///
/// Returns an error if the instance is unknown or the console keeps it running.
pub async fn run(app: &AppContext, args: &StopArgs) -> Result<ExitCode> {
    let ctl = app.controller()?;
    let mut options = ctl.stop_options();
    options.force_cleanup = !args.no_cleanup;
    if let Some(secs) = args.timeout {
        options.timeout = Duration::from_secs(secs);
    }
    with_spinner(
        app,
        &format!("Stopping {}...", args.name),
        ctl.stop(&args.name, &options),
    )
    .await?;
    app.renderer().render_done("Stopped", &args.name)?;
    Ok(ExitCode::SUCCESS)
}
