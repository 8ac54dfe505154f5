//! `emufleet remove <name>`: delete an instance permanently.

use anyhow::Result;
use clap::Args;
use std::process::ExitCode;

use crate::app::AppContext;
use crate::commands::with_spinner;

#[derive(Args)]
pub struct RemoveArgs {
    /// Instance name
    pub name: String,
}

/// Run `emufleet remove`.
///
/// # Errors
///
/// Returns an error if the prompt fails or the console keeps listing the
/// instance after removal.
pub async fn run(app: &AppContext, args: &RemoveArgs) -> Result<ExitCode> {
    // `--yes`, `CI` and `EMUFLEET_YES` answer the prompt with "yes".
    if !app.non_interactive
        && !app.confirm(&format!("Remove {} and all of its data?", args.name), false)?
    {
        app.output.info("Cancelled.");
        return Ok(ExitCode::SUCCESS);
    }

    let ctl = app.controller()?;
    with_spinner(
        app,
        &format!("Removing {}...", args.name),
        ctl.remove(&args.name),
    )
    .await?;
    app.renderer().render_done("Removed", &args.name)?;
    Ok(ExitCode::SUCCESS)
}
