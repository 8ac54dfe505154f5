//! JSON output helpers.
//!
//! Provides the error-object formatter used by all `--json` code paths when
//! a command fails, and `JsonRenderer` for successful results.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;

use crate::domain::batch::BatchResult;
use crate::domain::bridge::BridgeDevice;
use crate::domain::config::FleetConfig;
use crate::domain::instance::Instance;

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails (should not happen in
/// practice; `serde_json` only fails on non-finite floats and maps with
/// non-string keys, neither of which appear here).
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

fn emit(value: &impl Serialize) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("JSON serialization failed")?
    );
    Ok(())
}

/// Renders results as pretty-printed JSON on stdout.
pub struct JsonRenderer;

#[allow(clippy::unused_self)]
impl JsonRenderer {
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_instances(&self, instances: &[Instance]) -> Result<()> {
        emit(&json!({ "instances": instances }))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_instance(&self, action: &str, instance: &Instance) -> Result<()> {
        emit(&json!({ "action": action, "instance": instance }))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_done(&self, action: &str, name: &str) -> Result<()> {
        emit(&json!({ "action": action, "name": name, "ok": true }))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_clone(&self, source: &str, target: &Instance, relaunched: bool) -> Result<()> {
        emit(&json!({
            "action": "clone",
            "source": source,
            "instance": target,
            "source_relaunched": relaunched,
        }))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_port(&self, name: &str, port: u16) -> Result<()> {
        emit(&json!({ "name": name, "port": port }))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_exec(&self, target: &str, output: &str) -> Result<()> {
        emit(&json!({ "target": target, "output": output }))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_batch(&self, action: &str, result: &BatchResult) -> Result<()> {
        emit(&json!({ "action": action, "result": result }))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_devices(&self, devices: &[BridgeDevice]) -> Result<()> {
        emit(&json!({ "devices": devices }))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_config(&self, config: &FleetConfig, path: &Path) -> Result<()> {
        emit(&json!({ "path": path, "config": config }))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_config_path(&self, path: &Path) -> Result<()> {
        emit(&json!({ "path": path }))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_config_set(&self, key: &str, value: &str) -> Result<()> {
        emit(&json!({ "key": key, "value": value, "ok": true }))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_version(&self, version: &str) -> Result<()> {
        emit(&json!({ "version": version }))
    }
}
