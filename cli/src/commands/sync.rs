//! `emufleet sync [name]`: reconcile cached state with the console and bridge.

use anyhow::Result;
use clap::Args;
use std::process::ExitCode;

use crate::app::AppContext;

#[derive(Args)]
pub struct SyncArgs {
    /// Instance to reconcile (default: every instance)
    pub name: Option<String>,
}

/// Run `emufleet sync`.
///
/// # Errors
///
/// Returns an error if the named instance is unknown or lost its bridge
/// connection, or if the console cannot be enumerated.
pub async fn run(app: &AppContext, args: &SyncArgs) -> Result<ExitCode> {
    let ctl = app.controller()?;
    match &args.name {
        Some(name) => {
            let inst = ctl.sync_state(name).await?;
            app.renderer().render_instance("Synced", &inst)?;
        }
        None => {
            ctl.sync_all().await?;
            app.renderer().render_instances(&ctl.get_instances())?;
        }
    }
    Ok(ExitCode::SUCCESS)
}
