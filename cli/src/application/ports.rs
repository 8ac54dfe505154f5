//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.
//!
//! Every method returns a `Send` future so services can hand work to
//! `tokio::spawn` (clone restarts its source in the background). Adapters
//! implement them with plain `async fn`.

use std::future::Future;
use std::process::Output;
use std::time::Duration;

use anyhow::Result;

use crate::domain::config::FleetConfig;

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
pub trait CommandRunner: Send + Sync {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    fn run(&self, program: &str, args: &[&str]) -> impl Future<Output = Result<Output>> + Send;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned. Exceeding `timeout`
    /// yields `FleetError::CommandTimeout` and the child is killed.
    fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> impl Future<Output = Result<Output>> + Send;
}

// ── Instance Console Port ─────────────────────────────────────────────────────

/// The instance console tool. Exit codes are advisory: callers cross-check
/// every mutating call against `list2`.
pub trait InstanceConsole: Send + Sync {
    /// Full enumeration, one `index,name,...` row per instance.
    fn list2(&self) -> impl Future<Output = Result<Output>> + Send;
    /// Names of running instances, one per line.
    fn running_list(&self) -> impl Future<Output = Result<Output>> + Send;
    fn add(&self, name: &str) -> impl Future<Output = Result<Output>> + Send;
    fn launch(&self, index: u32) -> impl Future<Output = Result<Output>> + Send;
    fn quit(&self, name: &str) -> impl Future<Output = Result<Output>> + Send;
    /// Apply hardware settings (`--resolution`, `--cpu`, `--memory`).
    fn modify(&self, name: &str, args: &[String]) -> impl Future<Output = Result<Output>> + Send;
    /// Copy `source` into a new instance called `target`.
    fn copy(&self, target: &str, source: &str) -> impl Future<Output = Result<Output>> + Send;
    fn remove(&self, name: &str) -> impl Future<Output = Result<Output>> + Send;
    fn setprop(
        &self,
        name: &str,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<Output>> + Send;
}

// ── Device Bridge Port ────────────────────────────────────────────────────────

/// The device bridge tool. `address` is `host:port`; `serial` is whatever
/// `devices` listed.
pub trait DeviceBridge: Send + Sync {
    fn connect(&self, address: &str) -> impl Future<Output = Result<Output>> + Send;
    fn disconnect(&self, address: &str) -> impl Future<Output = Result<Output>> + Send;
    fn devices(&self) -> impl Future<Output = Result<Output>> + Send;
    /// `-s <serial> shell <command>`.
    fn shell(
        &self,
        serial: &str,
        command: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<Output>> + Send;
    fn pull(
        &self,
        serial: &str,
        remote: &str,
        local: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<Output>> + Send;
    fn push(
        &self,
        serial: &str,
        local: &str,
        remote: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<Output>> + Send;
    fn install(
        &self,
        serial: &str,
        package: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<Output>> + Send;
    fn kill_server(&self) -> impl Future<Output = Result<Output>> + Send;
    fn start_server(&self) -> impl Future<Output = Result<Output>> + Send;
}

// ── Configuration Port ────────────────────────────────────────────────────────

/// Abstracts configuration persistence.
pub trait ConfigStore {
    /// Load the configuration, falling back to defaults when none is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored file cannot be read, parsed or validated.
    fn load(&self) -> Result<FleetConfig>;
    /// Persist `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn save(&self, config: &FleetConfig) -> Result<()>;
    /// Location of the configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    fn path(&self) -> Result<std::path::PathBuf>;
}

// ── Presentation Port ─────────────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the presentation layer. Sync trait; no async needed.
pub trait ProgressReporter: Send + Sync {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

/// Reporter that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {
    fn step(&self, _message: &str) {}
    fn success(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
}
