//! Tracing subscriber setup for the CLI.

use tracing_subscriber::EnvFilter;

/// Default filter for a `-v` count when `RUST_LOG` is unset.
#[must_use]
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "emufleet=info,warn",
        2 => "emufleet=debug,info",
        _ => "trace",
    }
}

/// Install the global subscriber. Logs go to stderr so `--json` stdout stays
/// machine-readable. `RUST_LOG` wins over `verbosity`.
pub fn init(verbosity: u8, no_color: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_target(verbosity > 1)
        .try_init();
}
