//! `emufleet devices`: list what the bridge daemon sees.

use anyhow::Result;
use std::process::ExitCode;

use crate::app::AppContext;

/// Run `emufleet devices`.
///
/// # Errors
///
/// Returns an error if the bridge cannot list devices even after a daemon
/// restart.
pub async fn run(app: &AppContext) -> Result<ExitCode> {
    let ctl = app.controller()?;
    let devices = ctl.pool().devices().await?;
    app.renderer().render_devices(&devices)?;
    Ok(ExitCode::SUCCESS)
}
