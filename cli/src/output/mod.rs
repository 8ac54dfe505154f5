//! Output formatting module

pub mod human;
pub mod json;
pub mod progress;
pub mod reporter;
pub mod styles;

use std::path::Path;

use anyhow::Result;
use console::Term;
use owo_colors::OwoColorize as _;
pub use human::HumanRenderer;
pub use json::JsonRenderer;
pub use reporter::TerminalReporter;
pub use styles::Styles;

use crate::domain::batch::BatchResult;
use crate::domain::bridge::BridgeDevice;
use crate::domain::config::FleetConfig;
use crate::domain::instance::Instance;

/// Output context carrying styling and terminal state.
pub struct OutputContext {
    /// Stylesheet for colored output.
    pub styles: Styles,
    /// Whether stdout is a TTY.
    pub is_tty: bool,
    /// Whether to suppress non-error output.
    pub quiet: bool,
}

impl OutputContext {
    /// Create output context based on CLI flags and environment.
    #[must_use]
    pub fn new(no_color: bool, quiet: bool) -> Self {
        let is_tty = Term::stdout().is_term();
        let use_colors = !no_color && is_tty && std::env::var("NO_COLOR").is_err();

        let mut styles = Styles::default();
        if use_colors {
            styles.colorize();
        }

        Self {
            styles,
            is_tty,
            quiet,
        }
    }

    /// Check if progress indicators should be shown.
    #[must_use]
    pub fn show_progress(&self) -> bool {
        self.is_tty && !self.quiet
    }

    /// Print a success message prefixed with `✓`. Suppressed when `quiet`.
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "✓".style(self.styles.success));
        }
    }

    /// Print a warning message prefixed with `⚠`. Suppressed when `quiet`.
    pub fn warn(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "⚠".style(self.styles.warning));
        }
    }

    /// Print an error message prefixed with `✗` to stderr. Never suppressed.
    pub fn error(&self, msg: &str) {
        eprintln!("  {} {msg}", "✗".style(self.styles.error));
    }

    /// Print an info message prefixed with `ℹ`. Suppressed when `quiet`.
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "ℹ".style(self.styles.info));
        }
    }

    /// Print a section header. Suppressed when `quiet`.
    pub fn header(&self, msg: &str) {
        if !self.quiet {
            println!("  {}", msg.style(self.styles.header));
        }
    }

    /// Print a key-value pair with the key dimmed. Suppressed when `quiet`.
    pub fn kv(&self, key: &str, value: &str) {
        if !self.quiet {
            println!("  {}  {value}", key.style(self.styles.dim));
        }
    }
}

/// Output-mode dispatch so commands never branch on `--json` themselves.
pub enum Renderer<'a> {
    Human(HumanRenderer<'a>),
    Json(JsonRenderer),
}

macro_rules! dispatch {
    ($self:ident . $method:ident ( $($arg:expr),* )) => {
        match $self {
            Renderer::Human(r) => {
                r.$method($($arg),*);
                Ok(())
            }
            Renderer::Json(r) => r.$method($($arg),*),
        }
    };
}

impl Renderer<'_> {
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_instances(&self, instances: &[Instance]) -> Result<()> {
        dispatch!(self.render_instances(instances))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_instance(&self, action: &str, instance: &Instance) -> Result<()> {
        dispatch!(self.render_instance(action, instance))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_done(&self, action: &str, name: &str) -> Result<()> {
        dispatch!(self.render_done(action, name))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_clone(&self, source: &str, target: &Instance, relaunched: bool) -> Result<()> {
        dispatch!(self.render_clone(source, target, relaunched))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_port(&self, name: &str, port: u16) -> Result<()> {
        dispatch!(self.render_port(name, port))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_exec(&self, target: &str, output: &str) -> Result<()> {
        dispatch!(self.render_exec(target, output))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_batch(&self, action: &str, result: &BatchResult) -> Result<()> {
        dispatch!(self.render_batch(action, result))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_devices(&self, devices: &[BridgeDevice]) -> Result<()> {
        dispatch!(self.render_devices(devices))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_config(&self, config: &FleetConfig, path: &Path) -> Result<()> {
        dispatch!(self.render_config(config, path))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_config_path(&self, path: &Path) -> Result<()> {
        dispatch!(self.render_config_path(path))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_config_set(&self, key: &str, value: &str) -> Result<()> {
        dispatch!(self.render_config_set(key, value))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_version(&self, version: &str) -> Result<()> {
        dispatch!(self.render_version(version))
    }
}
