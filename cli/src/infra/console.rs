//! Infrastructure implementation of the `InstanceConsole` port.
//!
//! `ConsoleCli<R>` turns each port call into an argv for the instance console
//! executable and routes it through a `CommandRunner`.

use std::process::Output;

use anyhow::{Context, Result};

use crate::application::ports::{CommandRunner, InstanceConsole};

/// Adapter for the instance console executable.
///
/// Generic over `R: CommandRunner` so that tests can inject a recording
/// runner without spawning real processes.
pub struct ConsoleCli<R: CommandRunner> {
    runner: R,
    program: String,
}

impl<R: CommandRunner> ConsoleCli<R> {
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
        let verb = args.first().copied().unwrap_or_default();
        tracing::debug!(program = %self.program, ?args, "console");
        self.runner
            .run(&self.program, args)
            .await
            .with_context(|| format!("{} {verb}", self.program))
    }
}

impl<R: CommandRunner> InstanceConsole for ConsoleCli<R> {
    async fn list2(&self) -> Result<Output> {
        self.call(&["list2"]).await
    }

    async fn running_list(&self) -> Result<Output> {
        self.call(&["runninglist"]).await
    }

    async fn add(&self, name: &str) -> Result<Output> {
        self.call(&["add", "--name", name]).await
    }

    async fn launch(&self, index: u32) -> Result<Output> {
        let index = index.to_string();
        self.call(&["launch", "--index", &index]).await
    }

    async fn quit(&self, name: &str) -> Result<Output> {
        self.call(&["quit", "--name", name]).await
    }

    async fn modify(&self, name: &str, settings: &[String]) -> Result<Output> {
        let mut args = vec!["modify", "--name", name];
        args.extend(settings.iter().map(String::as_str));
        self.call(&args).await
    }

    async fn copy(&self, target: &str, source: &str) -> Result<Output> {
        self.call(&["copy", "--name", target, "--from", source]).await
    }

    async fn remove(&self, name: &str) -> Result<Output> {
        self.call(&["remove", "--name", name]).await
    }

    async fn setprop(&self, name: &str, key: &str, value: &str) -> Result<Output> {
        self.call(&["setprop", "--name", name, "--key", key, "--value", value])
            .await
    }
}
