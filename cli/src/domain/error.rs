//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator. Callers that need to branch on the kind recover it
//! with [`FleetError::find`].

use std::time::Duration;

use thiserror::Error;

use crate::domain::instance::LifecyclePhase;

// ── Fleet errors ──────────────────────────────────────────────────────────────

/// Errors surfaced by the fleet controller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FleetError {
    #[error("Instance '{name}' not found. Known instances: {}", known_list(.known))]
    InstanceNotFound { name: String, known: Vec<String> },

    #[error("Instance '{0}' already exists.")]
    AlreadyExists(String),

    #[error("Failed to launch '{name}' after {attempts} attempt(s): {last_error}")]
    LaunchFailed {
        name: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Command `{command}` timed out after {}s", .timeout.as_secs_f64())]
    CommandTimeout { command: String, timeout: Duration },

    #[error("Clone of '{origin}' into '{target}' could not be verified: target missing after copy")]
    CloneVerificationFailed { origin: String, target: String },

    #[error("Bridge connection to '{name}' lost (port {port})")]
    BridgeConnectionLost { name: String, port: u16 },

    #[error("No bridge device matches '{0}'")]
    DeviceNotFound(String),

    #[error("Instance '{name}' cannot move from {from} to {to}")]
    InvalidTransition {
        name: String,
        from: LifecyclePhase,
        to: LifecyclePhase,
    },

    #[error("Instance console {operation} failed: {detail}")]
    ConsoleFailed { operation: String, detail: String },

    #[error("Device bridge {operation} failed: {detail}")]
    BridgeFailed { operation: String, detail: String },

    #[error("Invalid instance name '{0}': must be 1-64 characters without commas or line breaks")]
    InvalidName(String),
}

impl FleetError {
    /// Find the first `FleetError` in an `anyhow` error chain.
    #[must_use]
    pub fn find(err: &anyhow::Error) -> Option<&FleetError> {
        err.chain().find_map(|cause| cause.downcast_ref::<FleetError>())
    }

    /// Stable machine-readable code used by `--json` output.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InstanceNotFound { .. } => "instance_not_found",
            Self::AlreadyExists(_) => "already_exists",
            Self::LaunchFailed { .. } => "launch_failed",
            Self::CommandTimeout { .. } => "command_timeout",
            Self::CloneVerificationFailed { .. } => "clone_verification_failed",
            Self::BridgeConnectionLost { .. } => "bridge_connection_lost",
            Self::DeviceNotFound(_) => "device_not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::ConsoleFailed { .. } => "console_failed",
            Self::BridgeFailed { .. } => "bridge_failed",
            Self::InvalidName(_) => "invalid_name",
        }
    }

    /// Whether an operation that failed with this error is worth retrying.
    ///
    /// Identity and state-machine errors cannot be fixed by trying again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::InstanceNotFound { .. }
                | Self::AlreadyExists(_)
                | Self::InvalidTransition { .. }
                | Self::InvalidName(_)
        )
    }
}

fn known_list(known: &[String]) -> String {
    if known.is_empty() {
        "(none)".to_string()
    } else {
        known.join(", ")
    }
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to configuration key/value validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown setting: {key}\n\nValid settings: {valid}")]
    UnknownKey { key: String, valid: String },

    #[error("Invalid value for {key}: {value}\n\nExpected: {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },
}
