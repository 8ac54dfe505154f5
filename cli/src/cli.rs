//! CLI argument parsing with clap derive

use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use crate::app::{AppContext, AppFlags, BehaviourFlags, OutputFlags};
use crate::commands;

/// Control plane for fleets of emulated Android instances
#[derive(Parser)]
#[command(
    name = "emufleet",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Skip confirmation prompts
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List instances
    List(commands::list::ListArgs),

    /// Create an instance
    Create(commands::create::CreateArgs),

    /// Launch an instance and attach the bridge
    Launch(commands::launch::LaunchArgs),

    /// Stop an instance
    Stop(commands::stop::StopArgs),

    /// Stop then launch an instance
    Restart(commands::restart::RestartArgs),

    /// Copy an instance
    Clone(commands::clone::CloneArgs),

    /// Remove an instance
    Remove(commands::remove::RemoveArgs),

    /// Print the bridge port of an instance
    Port(commands::port::PortArgs),

    /// Run a shell command on a device
    Exec(commands::exec::ExecArgs),

    /// Launch every stopped instance in batches
    LaunchAll(commands::batch::LaunchAllArgs),

    /// Stop every running instance in batches
    StopAll(commands::batch::StopAllArgs),

    /// Reconcile state with the console and bridge
    Sync(commands::sync::SyncArgs),

    /// List bridge devices
    Devices,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            json,
            quiet,
            no_color,
            yes,
            verbose: _,
            command,
        } = self;
        let app = AppContext::new(&AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                json,
            },
            behaviour: BehaviourFlags { yes },
        });

        match command {
            Command::List(args) => commands::list::run(&app, &args).await,
            Command::Create(args) => commands::create::run(&app, &args).await,
            Command::Launch(args) => commands::launch::run(&app, &args).await,
            Command::Stop(args) => commands::stop::run(&app, &args).await,
            Command::Restart(args) => commands::restart::run(&app, &args).await,
            Command::Clone(args) => commands::clone::run(&app, &args).await,
            Command::Remove(args) => commands::remove::run(&app, &args).await,
            Command::Port(args) => commands::port::run(&app, &args).await,
            Command::Exec(args) => commands::exec::run(&app, &args).await,
            Command::LaunchAll(args) => commands::batch::launch_all(&app, &args).await,
            Command::StopAll(args) => commands::batch::stop_all(&app, &args).await,
            Command::Sync(args) => commands::sync::run(&app, &args).await,
            Command::Devices => commands::devices::run(&app).await,
            Command::Config(cmd) => commands::config::run(&app, &cmd),
            Command::Version => commands::version::run(&app),
        }
    }
}
