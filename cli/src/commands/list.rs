//! `emufleet list`: show every instance the console knows about.

use anyhow::Result;
use clap::Args;
use std::process::ExitCode;

use crate::app::AppContext;

#[derive(Args)]
pub struct ListArgs {
    /// Reconcile each instance against the bridge before listing
    #[arg(long)]
    pub sync: bool,
}

/// Run `emufleet list`.
///
/// # Errors
///
/// Returns an error if the console cannot be enumerated.
pub async fn run(app: &AppContext, args: &ListArgs) -> Result<ExitCode> {
    let ctl = app.controller()?;
    if args.sync {
        ctl.sync_all().await?;
    } else {
        ctl.refresh().await?;
    }
    app.renderer().render_instances(&ctl.get_instances())?;
    Ok(ExitCode::SUCCESS)
}
