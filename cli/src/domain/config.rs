//! Domain types and validators for fleet configuration.
//!
//! Pure functions only: no I/O, no async, no filesystem access.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::bridge::LOOPBACK_HOST;
use crate::domain::error::ConfigError;
use crate::domain::port::DEFAULT_BASE_PORT;
use crate::domain::retry::RetryPolicy;

// ── Constants ────────────────────────────────────────────────────────────────

pub const VALID_CONFIG_KEYS: &[&str] = &[
    "tools.console",
    "tools.bridge",
    "bridge.host",
    "bridge.base_port",
    "timeouts.console",
    "timeouts.shell",
    "timeouts.interactive",
    "timeouts.transfer",
    "timeouts.boot",
    "timeouts.launch",
    "timeouts.stop",
    "timeouts.restart_settle",
    "retry.launch_attempts",
    "retry.launch_backoff",
    "retry.connect_attempts",
    "retry.connect_backoff",
    "batch.max_concurrent",
    "batch.delay",
];

/// Highest index the port formula must still fit for.
const MIN_INDEX_HEADROOM: u32 = 128;

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `~/.emufleet/config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FleetConfig {
    pub tools: ToolsConfig,
    pub bridge: BridgeConfig,
    pub timeouts: TimeoutsConfig,
    pub retry: RetryConfig,
    pub batch: BatchConfig,
}

/// Locations of the two external tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Instance console executable.
    pub console: String,
    /// Device bridge executable.
    pub bridge: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            console: "ldconsole".to_string(),
            bridge: "adb".to_string(),
        }
    }
}

/// Bridge addressing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub host: String,
    pub base_port: u16,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: LOOPBACK_HOST.to_string(),
            base_port: DEFAULT_BASE_PORT,
        }
    }
}

/// Timeouts, all in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    /// Any single instance console call.
    pub console: u64,
    /// Plain bridge shell commands.
    pub shell: u64,
    /// Tap, swipe, keyevent, text input.
    pub interactive: u64,
    /// Pull, push, install.
    pub transfer: u64,
    /// Boot-complete wait inside one launch attempt.
    pub boot: u64,
    /// Whole launch including retries.
    pub launch: u64,
    /// Quit verification.
    pub stop: u64,
    /// Pause between stop and launch during restart.
    pub restart_settle: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            console: 30,
            shell: 30,
            interactive: 5,
            transfer: 300,
            boot: 90,
            launch: 240,
            stop: 30,
            restart_settle: 3,
        }
    }
}

impl TimeoutsConfig {
    #[must_use]
    pub fn console(&self) -> Duration {
        Duration::from_secs(self.console)
    }
    #[must_use]
    pub fn shell(&self) -> Duration {
        Duration::from_secs(self.shell)
    }
    #[must_use]
    pub fn interactive(&self) -> Duration {
        Duration::from_secs(self.interactive)
    }
    #[must_use]
    pub fn transfer(&self) -> Duration {
        Duration::from_secs(self.transfer)
    }
    #[must_use]
    pub fn boot(&self) -> Duration {
        Duration::from_secs(self.boot)
    }
    #[must_use]
    pub fn launch(&self) -> Duration {
        Duration::from_secs(self.launch)
    }
    #[must_use]
    pub fn stop(&self) -> Duration {
        Duration::from_secs(self.stop)
    }
    #[must_use]
    pub fn restart_settle(&self) -> Duration {
        Duration::from_secs(self.restart_settle)
    }
}

/// Retry budgets. Backoffs in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub launch_attempts: u32,
    pub launch_backoff: u64,
    pub connect_attempts: u32,
    pub connect_backoff: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            launch_attempts: 3,
            launch_backoff: 3,
            connect_attempts: 3,
            connect_backoff: 1,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn launch_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.launch_attempts, Duration::from_secs(self.launch_backoff))
    }

    #[must_use]
    pub fn connect_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.connect_attempts,
            Duration::from_secs(self.connect_backoff),
        )
    }
}

/// Fleet-wide batch defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub max_concurrent: usize,
    /// Pause between batches, in seconds.
    pub delay: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            delay: 5,
        }
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Validates a whole configuration.
///
/// # Errors
///
/// Returns the first invalid setting found.
pub fn validate_config(config: &FleetConfig) -> Result<()> {
    let invalid = |key: &str, value: String, expected: &str| -> anyhow::Error {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value,
            expected: expected.to_string(),
        }
        .into()
    };

    if config.tools.console.trim().is_empty() {
        return Err(invalid("tools.console", String::new(), "a program name or path"));
    }
    if config.tools.bridge.trim().is_empty() {
        return Err(invalid("tools.bridge", String::new(), "a program name or path"));
    }
    if config.bridge.host.trim().is_empty() {
        return Err(invalid("bridge.host", String::new(), "a host name or IP"));
    }
    let max_base = u32::from(u16::MAX) - MIN_INDEX_HEADROOM * 2;
    if config.bridge.base_port == 0 || u32::from(config.bridge.base_port) > max_base {
        return Err(invalid(
            "bridge.base_port",
            config.bridge.base_port.to_string(),
            &format!("1..={max_base}"),
        ));
    }

    let t = &config.timeouts;
    for (key, value) in [
        ("timeouts.console", t.console),
        ("timeouts.shell", t.shell),
        ("timeouts.interactive", t.interactive),
        ("timeouts.transfer", t.transfer),
        ("timeouts.boot", t.boot),
        ("timeouts.launch", t.launch),
        ("timeouts.stop", t.stop),
    ] {
        if value == 0 {
            return Err(invalid(key, value.to_string(), "seconds greater than 0"));
        }
    }
    if config.retry.launch_attempts == 0 {
        return Err(invalid("retry.launch_attempts", "0".into(), "at least 1"));
    }
    if config.retry.connect_attempts == 0 {
        return Err(invalid("retry.connect_attempts", "0".into(), "at least 1"));
    }
    if config.batch.max_concurrent == 0 {
        return Err(invalid("batch.max_concurrent", "0".into(), "at least 1"));
    }
    Ok(())
}

/// Validates a configuration key against the whitelist.
///
/// # Errors
///
/// Returns an error if the key is not in the allowed list.
pub fn validate_config_key(key: &str) -> Result<()> {
    if !VALID_CONFIG_KEYS.contains(&key) {
        return Err(ConfigError::UnknownKey {
            key: key.to_string(),
            valid: VALID_CONFIG_KEYS.join(", "),
        }
        .into());
    }
    Ok(())
}

/// Apply `key = value` to `config`, then validate the result.
///
/// # Errors
///
/// Returns an error for unknown keys, unparsable values, or a value that
/// makes the configuration invalid.
pub fn apply_setting(config: &mut FleetConfig, key: &str, value: &str) -> Result<()> {
    validate_config_key(key)?;

    let mut next = config.clone();
    match key {
        "tools.console" => next.tools.console = value.to_string(),
        "tools.bridge" => next.tools.bridge = value.to_string(),
        "bridge.host" => next.bridge.host = value.to_string(),
        "bridge.base_port" => next.bridge.base_port = parse_number(key, value)?,
        "timeouts.console" => next.timeouts.console = parse_number(key, value)?,
        "timeouts.shell" => next.timeouts.shell = parse_number(key, value)?,
        "timeouts.interactive" => next.timeouts.interactive = parse_number(key, value)?,
        "timeouts.transfer" => next.timeouts.transfer = parse_number(key, value)?,
        "timeouts.boot" => next.timeouts.boot = parse_number(key, value)?,
        "timeouts.launch" => next.timeouts.launch = parse_number(key, value)?,
        "timeouts.stop" => next.timeouts.stop = parse_number(key, value)?,
        "timeouts.restart_settle" => next.timeouts.restart_settle = parse_number(key, value)?,
        "retry.launch_attempts" => next.retry.launch_attempts = parse_number(key, value)?,
        "retry.launch_backoff" => next.retry.launch_backoff = parse_number(key, value)?,
        "retry.connect_attempts" => next.retry.connect_attempts = parse_number(key, value)?,
        "retry.connect_backoff" => next.retry.connect_backoff = parse_number(key, value)?,
        "batch.max_concurrent" => next.batch.max_concurrent = parse_number(key, value)?,
        "batch.delay" => next.batch.delay = parse_number(key, value)?,
        _ => unreachable!("key validated against VALID_CONFIG_KEYS"),
    }
    validate_config(&next)?;
    *config = next;
    Ok(())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected: "a non-negative integer".to_string(),
        }
        .into()
    })
}

// ── Unit tests ───────────────────────────────────────────────────────────────
