//! `emufleet launch <name>`: boot an instance and attach the bridge.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::lifecycle::LaunchOptions;
use crate::commands::with_spinner;

#[derive(Args)]
pub struct LaunchArgs {
    /// Instance name
    pub name: String,

    /// Total launch attempts (default: retry.launch_attempts)
    #[arg(long)]
    pub retries: Option<u32>,

    /// Skip the shell probe after connecting
    #[arg(long)]
    pub no_health: bool,

    /// Overall deadline in seconds (default: timeouts.launch)
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl LaunchArgs {
    /// Overlay the flags on the configured defaults.
    #[must_use]
    pub fn apply(&self, mut options: LaunchOptions) -> LaunchOptions {
        if let Some(retries) = self.retries {
            options.retry_count = retries.max(1);
        }
        if let Some(secs) = self.timeout {
            options.timeout = Duration::from_secs(secs);
        }
        if self.no_health {
            options.verify_health = false;
        }
        options
    }
}

/// Run `emufleet launch`.
///
/// # Errors
///
/// Returns an error if the instance is unknown or every attempt fails.
pub async fn run(app: &AppContext, args: &LaunchArgs) -> Result<ExitCode> {
    let ctl = app.controller()?;
    let options = args.apply(ctl.launch_options());
    let inst = with_spinner(
        app,
        &format!("Launching {}...", args.name),
        ctl.launch(&args.name, &options),
    )
    .await?;
    app.renderer().render_instance("Launched", &inst)?;
    Ok(ExitCode::SUCCESS)
}
