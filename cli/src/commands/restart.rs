//! `emufleet restart <name>`

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::commands::with_spinner;

#[derive(Args)]
pub struct RestartArgs {
    /// Instance name
    pub name: String,

    /// Launch deadline in seconds (default: timeouts.launch)
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Run `emufleet restart`.
///
/// # Errors
///
/// Returns an error if the stop or the relaunch fails.
pub async fn run(app: &AppContext, args: &RestartArgs) -> Result<ExitCode> {
    let ctl = app.controller()?;
    let mut options = ctl.restart_options();
    if let Some(secs) = args.timeout {
        options.timeout = Duration::from_secs(secs);
    }
    let inst = with_spinner(
        app,
        &format!("Restarting {}...", args.name),
        ctl.restart(&args.name, &options),
    )
    .await?;
    app.renderer().render_instance("Restarted", &inst)?;
    Ok(ExitCode::SUCCESS)
}
