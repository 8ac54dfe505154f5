//! `emufleet clone <source> <target>`: copy an instance.
//!
//! A running source is stopped for the copy and relaunched in the background
//! by the controller. The CLI is short-lived, so it waits for that relaunch
//! before exiting and reports a failed relaunch as a warning.

use anyhow::Result;
use clap::Args;
use std::process::ExitCode;

use crate::app::AppContext;
use crate::commands::with_spinner;

#[derive(Args)]
pub struct CloneArgs {
    /// Instance to copy
    pub source: String,
    /// Name of the copy (replaced if it exists)
    pub target: String,
}

/// Run `emufleet clone`.
///
/// # Errors
///
/// Returns an error if the source is unknown or the copy cannot be verified.
pub async fn run(app: &AppContext, args: &CloneArgs) -> Result<ExitCode> {
    let ctl = app.controller()?;
    let mut outcome = with_spinner(
        app,
        &format!("Cloning {} → {}...", args.source, args.target),
        ctl.clone_instance(&args.source, &args.target),
    )
    .await?;

    let had_restart = outcome.source_restart.is_some();
    let relaunched = if had_restart {
        match with_spinner(
            app,
            &format!("Relaunching {}...", args.source),
            outcome.join_source_restart(),
        )
        .await
        {
            Ok(()) => true,
            Err(err) => {
                app.output
                    .warn(&format!("{} was not relaunched: {err:#}", args.source));
                false
            }
        }
    } else {
        false
    };

    app.renderer()
        .render_clone(&args.source, &outcome.instance, relaunched)?;
    Ok(ExitCode::SUCCESS)
}
