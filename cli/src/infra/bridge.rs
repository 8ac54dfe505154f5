//! Infrastructure implementation of the `DeviceBridge` port.

use std::process::Output;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::application::ports::{CommandRunner, DeviceBridge};

/// Adapter for the device bridge executable (`adb`-compatible argv).
pub struct AdbBridge<R: CommandRunner> {
    runner: R,
    program: String,
}

impl<R: CommandRunner> AdbBridge<R> {
    pub fn new(runner: R, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    async fn call(&self, args: &[&str]) -> Result<Output> {
        tracing::trace!(program = %self.program, ?args, "bridge");
        self.runner
            .run(&self.program, args)
            .await
            .with_context(|| format!("{} {}", self.program, args.join(" ")))
    }

    async fn call_with_timeout(&self, args: &[&str], timeout: Duration) -> Result<Output> {
        tracing::trace!(program = %self.program, ?args, secs = timeout.as_secs(), "bridge");
        self.runner
            .run_with_timeout(&self.program, args, timeout)
            .await
            .with_context(|| format!("{} {}", self.program, args.join(" ")))
    }
}

impl<R: CommandRunner> DeviceBridge for AdbBridge<R> {
    async fn connect(&self, address: &str) -> Result<Output> {
        self.call(&["connect", address]).await
    }

    async fn disconnect(&self, address: &str) -> Result<Output> {
        self.call(&["disconnect", address]).await
    }

    async fn devices(&self) -> Result<Output> {
        self.call(&["devices"]).await
    }

    async fn shell(&self, serial: &str, command: &str, timeout: Duration) -> Result<Output> {
        self.call_with_timeout(&["-s", serial, "shell", command], timeout)
            .await
    }

    async fn pull(
        &self,
        serial: &str,
        remote: &str,
        local: &str,
        timeout: Duration,
    ) -> Result<Output> {
        self.call_with_timeout(&["-s", serial, "pull", remote, local], timeout)
            .await
    }

    async fn push(
        &self,
        serial: &str,
        local: &str,
        remote: &str,
        timeout: Duration,
    ) -> Result<Output> {
        self.call_with_timeout(&["-s", serial, "push", local, remote], timeout)
            .await
    }

    async fn install(&self, serial: &str, package: &str, timeout: Duration) -> Result<Output> {
        self.call_with_timeout(&["-s", serial, "install", "-r", package], timeout)
            .await
    }

    async fn kill_server(&self) -> Result<Output> {
        self.call(&["kill-server"]).await
    }

    async fn start_server(&self) -> Result<Output> {
        self.call(&["start-server"]).await
    }
}
