//! emufleet - control plane for fleets of emulated Android instances

use std::process::ExitCode;

use clap::Parser;

use emufleet::cli::Cli;
use emufleet::domain::error::FleetError;
use emufleet::infra::logging;
use emufleet::output::json;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.no_color);
    let json_mode = cli.json;

    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            if json_mode {
                let code = FleetError::find(&e).map_or("error", FleetError::code);
                match json::format_error(&format!("{e:#}"), code) {
                    Ok(text) => println!("{text}"),
                    Err(_) => eprintln!("Error: {e:#}"),
                }
            } else {
                eprintln!("Error: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}
