//! `emufleet exec <target> <command...>`: run a shell command on a device.

use std::process::ExitCode;
use std::str::FromStr as _;
use std::time::Duration;

use anyhow::Result;
use clap::Args;

use crate::app::{AppContext, FleetController};
use crate::application::pool::{DeviceAddress, ExecOptions};

/// Arguments for the exec command.
#[derive(Args)]
#[command(trailing_var_arg = true)]
pub struct ExecArgs {
    /// Instance name, bridge port, or device serial
    pub target: String,

    /// Per-command timeout in seconds (default: timeouts.shell)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Re-resolve the device serial instead of using the cache
    #[arg(long)]
    pub fresh: bool,

    /// Shell command to run on the device
    #[arg(required = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Run a shell command against one device and print its output.
///
/// # Errors
///
/// Returns an error if the target cannot be resolved or the command fails or
/// times out.
pub async fn run(app: &AppContext, args: &ExecArgs) -> Result<ExitCode> {
    let ctl = app.controller()?;
    let target = resolve_target(&ctl, &args.target).await?;
    let options = ExecOptions {
        timeout: args.timeout.map(Duration::from_secs),
        skip_cache: args.fresh,
    };
    let output = ctl
        .execute_command(&target, &args.command.join(" "), options)
        .await?;
    app.renderer().render_exec(&args.target, &output)?;
    Ok(ExitCode::SUCCESS)
}

/// Instance names win over the port/serial reading of `raw`.
async fn resolve_target(ctl: &FleetController, raw: &str) -> Result<DeviceAddress> {
    ctl.refresh().await?;
    if ctl.registry().get(raw).is_some() {
        let port = ctl.get_adb_port_for_instance(raw).await?;
        return Ok(DeviceAddress::Port(port));
    }
    Ok(DeviceAddress::from_str(raw).unwrap_or_else(|never| match never {}))
}
