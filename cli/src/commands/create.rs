//! `emufleet create <name>`: add a new instance and apply hardware settings.

use anyhow::Result;
use clap::Args;
use std::process::ExitCode;

use crate::app::AppContext;
use crate::commands::with_spinner;
use crate::domain::instance::{InstanceConfig, Resolution};

#[derive(Args)]
pub struct CreateArgs {
    /// Instance name
    pub name: String,

    /// Display resolution as WIDTHxHEIGHT@DPI (e.g. 720x1280@320)
    #[arg(long, value_parser = Resolution::parse)]
    pub resolution: Option<Resolution>,

    /// Number of CPU cores
    #[arg(long)]
    pub cpu: Option<u32>,

    /// Memory in MiB
    #[arg(long)]
    pub memory: Option<u32>,
}

impl CreateArgs {
    fn instance_config(&self) -> InstanceConfig {
        InstanceConfig {
            resolution: self.resolution,
            cpu: self.cpu,
            memory: self.memory,
        }
    }
}

/// Run `emufleet create`.
///
/// # Errors
///
/// Returns an error if the name is invalid or taken, or the console fails.
pub async fn run(app: &AppContext, args: &CreateArgs) -> Result<ExitCode> {
    let ctl = app.controller()?;
    let inst = with_spinner(
        app,
        &format!("Creating {}...", args.name),
        ctl.create(&args.name, &args.instance_config()),
    )
    .await?;
    app.renderer().render_instance("Created", &inst)?;
    Ok(ExitCode::SUCCESS)
}
