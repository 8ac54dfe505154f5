//! `emufleet port <name>`: print the live bridge port of an instance.

use anyhow::Result;
use clap::Args;
use std::process::ExitCode;

use crate::app::AppContext;

#[derive(Args)]
pub struct PortArgs {
    /// Instance name
    pub name: String,
}

/// Run `emufleet port`.
///
/// # Errors
///
/// Returns an error if the instance is unknown or nothing answers on its port.
pub async fn run(app: &AppContext, args: &PortArgs) -> Result<ExitCode> {
    let ctl = app.controller()?;
    let port = ctl.get_adb_port_for_instance(&args.name).await?;
    app.renderer().render_port(&args.name, port)?;
    Ok(ExitCode::SUCCESS)
}
