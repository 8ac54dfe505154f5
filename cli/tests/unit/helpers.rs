//! Shared test helpers: scripted console and bridge fakes.

#![allow(dead_code)]

use std::process::{ExitStatus, Output};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use emufleet::application::ports::{DeviceBridge, InstanceConsole};

// ── Cross-platform ExitStatus construction ───────────────────────────────────

#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(code << 8)
}

#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    #[allow(clippy::cast_sign_loss)]
    ExitStatus::from_raw(code as u32)
}

pub fn ok_output(stdout: &str) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}

pub fn err_output(code: i32, stderr: &str) -> Output {
    Output {
        status: exit_status(code),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Shared call log.
#[derive(Debug, Clone, Default)]
pub struct Calls(Arc<Mutex<Vec<String>>>);

impl Calls {
    pub fn push(&self, call: impl Into<String>) {
        self.0.lock().expect("calls lock").push(call.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.0.lock().expect("calls lock").clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.snapshot().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

// ── Console ──────────────────────────────────────────────────────────────────

/// Console whose `list2` output is set by the test. Every other call
/// succeeds and is recorded.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConsole {
    list2: Arc<Mutex<String>>,
    pub calls: Calls,
}

impl ScriptedConsole {
    pub fn with_list2(rows: &str) -> Self {
        let console = Self::default();
        console.set_list2(rows);
        console
    }

    pub fn set_list2(&self, rows: &str) {
        *self.list2.lock().expect("list2 lock") = rows.to_string();
    }

    fn record(&self, call: String) -> Result<Output> {
        self.calls.push(call);
        Ok(ok_output(""))
    }
}

impl InstanceConsole for ScriptedConsole {
    async fn list2(&self) -> Result<Output> {
        self.calls.push("list2");
        Ok(ok_output(&self.list2.lock().expect("list2 lock")))
    }

    async fn running_list(&self) -> Result<Output> {
        self.calls.push("runninglist");
        Ok(ok_output(""))
    }

    async fn add(&self, name: &str) -> Result<Output> {
        self.record(format!("add {name}"))
    }

    async fn launch(&self, index: u32) -> Result<Output> {
        self.record(format!("launch {index}"))
    }

    async fn quit(&self, name: &str) -> Result<Output> {
        self.record(format!("quit {name}"))
    }

    async fn modify(&self, name: &str, args: &[String]) -> Result<Output> {
        self.record(format!("modify {name} {}", args.join(" ")))
    }

    async fn copy(&self, target: &str, source: &str) -> Result<Output> {
        self.record(format!("copy {target} {source}"))
    }

    async fn remove(&self, name: &str) -> Result<Output> {
        self.record(format!("remove {name}"))
    }

    async fn setprop(&self, name: &str, key: &str, value: &str) -> Result<Output> {
        self.record(format!("setprop {name} {key}={value}"))
    }
}

// ── Bridge ───────────────────────────────────────────────────────────────────

/// Bridge with a fixed `devices` listing. `shell` echoes
/// `<serial>:<command>` so tests can see which serial was addressed.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBridge {
    pub(crate) devices: Arc<Mutex<String>>,
    /// When set, `shell` sleeps this long before answering.
    pub shell_delay: Option<Duration>,
    pub calls: Calls,
}

impl ScriptedBridge {
    pub fn with_devices(serials: &[(&str, &str)]) -> Self {
        let bridge = Self::default();
        bridge.set_devices(serials);
        bridge
    }

    pub fn set_devices(&self, serials: &[(&str, &str)]) {
        let mut listing = String::from("List of devices attached\n");
        for (serial, state) in serials {
            listing.push_str(&format!("{serial}\t{state}\n"));
        }
        *self.devices.lock().expect("devices lock") = listing;
    }
}

impl DeviceBridge for ScriptedBridge {
    async fn connect(&self, address: &str) -> Result<Output> {
        self.calls.push(format!("connect {address}"));
        Ok(ok_output(&format!("already connected to {address}\n")))
    }

    async fn disconnect(&self, address: &str) -> Result<Output> {
        self.calls.push(format!("disconnect {address}"));
        Ok(ok_output(""))
    }

    async fn devices(&self) -> Result<Output> {
        self.calls.push("devices");
        Ok(ok_output(&self.devices.lock().expect("devices lock")))
    }

    async fn shell(&self, serial: &str, command: &str, _timeout: Duration) -> Result<Output> {
        self.calls.push(format!("shell {serial} {command}"));
        if let Some(delay) = self.shell_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(ok_output(&format!("{serial}:{command}\n")))
    }

    async fn pull(&self, serial: &str, remote: &str, local: &str, _: Duration) -> Result<Output> {
        self.calls.push(format!("pull {serial} {remote} {local}"));
        Ok(ok_output(""))
    }

    async fn push(&self, serial: &str, local: &str, remote: &str, _: Duration) -> Result<Output> {
        self.calls.push(format!("push {serial} {local} {remote}"));
        Ok(ok_output(""))
    }

    async fn install(&self, serial: &str, package: &str, _: Duration) -> Result<Output> {
        self.calls.push(format!("install {serial} {package}"));
        Ok(ok_output("Success\n"))
    }

    async fn kill_server(&self) -> Result<Output> {
        self.calls.push("kill-server");
        Ok(ok_output(""))
    }

    async fn start_server(&self) -> Result<Output> {
        self.calls.push("start-server");
        Ok(ok_output(""))
    }
}
