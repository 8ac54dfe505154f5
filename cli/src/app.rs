//! Application context: unified state passed to every command handler.
//!
//! `AppContext` owns the output context and the config store, and wires the
//! infrastructure adapters into a `LifecycleController` on demand so commands
//! that never touch the fleet (`config`, `version`) do not resolve tools.

use anyhow::Result;

use crate::application::lifecycle::{LifecycleController, LifecycleSettings};
use crate::application::pool::{BridgeConnectionPool, PoolSettings};
use crate::application::ports::ConfigStore;
use crate::application::registry::InstanceRegistry;
use crate::domain::config::FleetConfig;
use crate::domain::port::PortResolver;
use crate::infra::{AdbBridge, ConsoleCli, TokioCommandRunner, ToolPaths, YamlConfigStore};
use crate::output::{HumanRenderer, JsonRenderer, OutputContext, Renderer, TerminalReporter};

/// Controller wired to the real console and bridge executables.
pub type FleetController =
    LifecycleController<ConsoleCli<TokioCommandRunner>, AdbBridge<TokioCommandRunner>>;

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
}

/// Behaviour flags.
pub struct BehaviourFlags {
    /// Skip interactive prompts (also set by `CI` / `EMUFLEET_YES` env vars).
    pub yes: bool,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    /// Output rendering options.
    pub output: OutputFlags,
    /// Behaviour options.
    pub behaviour: BehaviourFlags,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    /// Where `FleetConfig` lives.
    pub config_store: YamlConfigStore,
    /// When `true`, skip interactive prompts and use defaults.
    pub non_interactive: bool,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// JSON mode implies quiet so progress chatter never interleaves with the
    /// document on stdout.
    #[must_use]
    pub fn new(flags: &AppFlags) -> Self {
        let ci_env = std::env::var("CI").is_ok() || std::env::var("EMUFLEET_YES").is_ok();
        let mode = if flags.output.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };
        Self {
            output: OutputContext::new(
                flags.output.no_color,
                flags.output.quiet || flags.output.json,
            ),
            mode,
            config_store: YamlConfigStore::new(),
            non_interactive: flags.behaviour.yes || ci_env,
        }
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Returns the appropriate `Renderer` variant for the current output mode.
    #[must_use]
    pub fn renderer(&self) -> Renderer<'_> {
        match self.mode {
            OutputMode::Human => Renderer::Human(HumanRenderer::new(&self.output)),
            OutputMode::Json => Renderer::Json(JsonRenderer),
        }
    }

    /// Progress sink for batch operations.
    #[must_use]
    pub fn reporter(&self) -> TerminalReporter<'_> {
        TerminalReporter::new(&self.output)
    }

    /// Load the config file, falling back to defaults when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or is invalid.
    pub fn load_config(&self) -> Result<FleetConfig> {
        self.config_store.load()
    }

    /// Build a controller from a fresh config load.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be loaded.
    pub fn controller(&self) -> Result<FleetController> {
        Ok(build_controller(&self.load_config()?))
    }

    /// Ask the user for confirmation.
    ///
    /// When `non_interactive` is `true` (CI, `--yes` flag, or `EMUFLEET_YES`
    /// env), returns `default` immediately without prompting.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal prompt fails (e.g. no TTY available).
    pub fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if self.non_interactive {
            return Ok(default);
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?;
        Ok(confirmed)
    }
}

/// Wire the adapters for `config` into a controller.
#[must_use]
pub fn build_controller(config: &FleetConfig) -> FleetController {
    let tools = ToolPaths::resolve(&config.tools);
    let console = ConsoleCli::new(TokioCommandRunner::new(config.timeouts.console()), tools.console);
    let bridge = AdbBridge::new(TokioCommandRunner::new(config.timeouts.shell()), tools.bridge);
    LifecycleController::new(
        console,
        BridgeConnectionPool::new(bridge, PoolSettings::from_config(config)),
        InstanceRegistry::new(PortResolver::new(config.bridge.base_port)),
        LifecycleSettings::from_config(config),
    )
}
