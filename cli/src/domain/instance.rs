//! Instance domain types and the lifecycle state machine.
//!
//! This module is intentionally free of I/O, async, and external layer imports.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::FleetError;

/// Observed run status of an instance, as reported to collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Stopped,
    Running,
    /// Initial state before the first successful reconciliation.
    #[default]
    Unknown,
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Unknown => "unknown",
        })
    }
}

/// Lifecycle phase driven by the controller.
///
/// ```text
/// stopped → launching → booting → connecting → verifying → running
/// running → stopping → stopped
/// any non-stopped phase → failed → stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LifecyclePhase {
    #[default]
    Stopped,
    Launching,
    Booting,
    Connecting,
    Verifying,
    Running,
    Stopping,
    Failed,
}

impl LifecyclePhase {
    /// Whether the controller may move an instance from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use LifecyclePhase::{
            Booting, Connecting, Failed, Launching, Running, Stopped, Stopping, Verifying,
        };
        match (self, next) {
            (Stopped | Failed, Launching)
            | (Launching, Booting)
            | (Booting, Connecting)
            | (Connecting, Verifying)
            | (Verifying, Running)
            | (Running | Failed, Stopping)
            | (Stopping | Failed, Stopped) => true,
            (from, Failed) => from != Stopped && from != Failed,
            _ => false,
        }
    }

    /// Status reported for an instance sitting in this phase.
    ///
    /// From `booting` onwards the console has been told to launch, so the
    /// instance is reported running even before the bridge attaches.
    #[must_use]
    pub fn status(self) -> InstanceStatus {
        match self {
            Self::Stopped | Self::Failed | Self::Launching => InstanceStatus::Stopped,
            Self::Booting
            | Self::Connecting
            | Self::Verifying
            | Self::Running
            | Self::Stopping => InstanceStatus::Running,
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stopped => "stopped",
            Self::Launching => "launching",
            Self::Booting => "booting",
            Self::Connecting => "connecting",
            Self::Verifying => "verifying",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Failed => "failed",
        })
    }
}

/// One emulated device known to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Unique name assigned at creation.
    pub name: String,
    /// Ordinal assigned by the instance console.
    pub index: u32,
    /// Cached bridge port. May diverge from `base_port + index*2`.
    pub port: u16,
    pub status: InstanceStatus,
    pub phase: LifecyclePhase,
    /// Console process id when the console reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub updated_at: DateTime<Utc>,
}

impl Instance {
    #[must_use]
    pub fn new(name: impl Into<String>, index: u32, port: u16) -> Self {
        Self {
            name: name.into(),
            index,
            port,
            status: InstanceStatus::Unknown,
            phase: LifecyclePhase::Stopped,
            pid: None,
            updated_at: Utc::now(),
        }
    }
}

/// Display resolution applied through the console's `modify` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
    pub dpi: u32,
}

impl Resolution {
    /// Parse `WIDTHxHEIGHT@DPI` or `WIDTH,HEIGHT,DPI`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value does not contain three positive integers.
    pub fn parse(value: &str) -> anyhow::Result<Self> {
        let parts: Vec<&str> = value
            .split(['x', '@', ','])
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        let [w, h, d] = parts.as_slice() else {
            anyhow::bail!("invalid resolution '{value}': expected WIDTHxHEIGHT@DPI");
        };
        let parse = |s: &str| -> anyhow::Result<u32> {
            let n: u32 = s
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid resolution '{value}': '{s}' is not a number"))?;
            anyhow::ensure!(n > 0, "invalid resolution '{value}': values must be positive");
            Ok(n)
        };
        Ok(Self {
            width: parse(w)?,
            height: parse(h)?,
            dpi: parse(d)?,
        })
    }

    /// Console argument form: `width,height,dpi`.
    #[must_use]
    pub fn to_console_arg(self) -> String {
        format!("{},{},{}", self.width, self.height, self.dpi)
    }
}

/// Optional hardware settings applied right after `add`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceConfig {
    pub resolution: Option<Resolution>,
    pub cpu: Option<u32>,
    /// Memory in MiB.
    pub memory: Option<u32>,
}

impl InstanceConfig {
    /// Arguments for `modify`, empty when nothing is set.
    #[must_use]
    pub fn modify_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(res) = self.resolution {
            args.push("--resolution".to_string());
            args.push(res.to_console_arg());
        }
        if let Some(cpu) = self.cpu {
            args.push("--cpu".to_string());
            args.push(cpu.to_string());
        }
        if let Some(memory) = self.memory {
            args.push("--memory".to_string());
            args.push(memory.to_string());
        }
        args
    }
}

/// Validates an instance name.
///
/// The console's enumeration output is comma separated and line oriented, so
/// names containing either would corrupt every later scan.
///
/// # Errors
///
/// Returns [`FleetError::InvalidName`] when the name is empty, too long, or
/// contains a comma or line break.
pub fn validate_instance_name(name: &str) -> Result<(), FleetError> {
    let len = name.chars().count();
    if len == 0
        || len > 64
        || name.trim() != name
        || name.contains([',', '\n', '\r'])
    {
        return Err(FleetError::InvalidName(name.to_string()));
    }
    Ok(())
}
