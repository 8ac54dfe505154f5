//! Bridge connection pool.
//!
//! The pool is the only owner of bridge connections. It resolves ports to
//! serials (cached per port), bounds every call with a timeout that surfaces
//! as `FleetError::CommandTimeout`, and recovers from a crashed bridge daemon
//! once per `devices` call.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::future::Future;
use std::process::Output;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::application::ports::DeviceBridge;
use crate::application::retry::retry;
use crate::domain::bridge::{
    BridgeDevice, ConnectOutcome, SerialMatch, canonical_serial, live_ports,
    parse_connect_output, parse_devices, select_serial, stale_serials,
};
use crate::domain::config::FleetConfig;
use crate::domain::error::FleetError;
use crate::domain::retry::RetryPolicy;

/// Timeout for `connect`, `disconnect`, `devices` and server control.
const CONTROL_TIMEOUT: Duration = Duration::from_secs(10);

/// `KEYCODE_HOME`.
pub const KEYCODE_HOME: u32 = 3;

/// Where a command should go.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeviceAddress {
    /// A bridge port; resolved to a serial through the cache.
    Port(u16),
    /// A serial used verbatim.
    Serial(String),
}

impl FromStr for DeviceAddress {
    type Err = std::convert::Infallible;

    /// Bare numbers are ports, anything else is a serial.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(s.parse::<u16>()
            .map_or_else(|_| Self::Serial(s.to_string()), Self::Port))
    }
}

impl From<u16> for DeviceAddress {
    fn from(port: u16) -> Self {
        Self::Port(port)
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Port(port) => write!(f, "port {port}"),
            Self::Serial(serial) => f.write_str(serial),
        }
    }
}

/// Per-call options for [`BridgeConnectionPool::execute`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecOptions {
    /// Overrides the pool's shell timeout.
    pub timeout: Option<Duration>,
    /// Re-resolve the serial instead of trusting the cache.
    pub skip_cache: bool,
}

/// Timeouts and policies for a pool.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub host: String,
    pub shell_timeout: Duration,
    pub interactive_timeout: Duration,
    pub transfer_timeout: Duration,
    pub connect_policy: RetryPolicy,
}

impl PoolSettings {
    #[must_use]
    pub fn from_config(config: &FleetConfig) -> Self {
        Self {
            host: config.bridge.host.clone(),
            shell_timeout: config.timeouts.shell(),
            interactive_timeout: config.timeouts.interactive(),
            transfer_timeout: config.timeouts.transfer(),
            connect_policy: config.retry.connect_policy(),
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self::from_config(&FleetConfig::default())
    }
}

/// Snapshot of pool counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub commands: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub reconnects: u64,
    pub server_restarts: u64,
    pub cached_serials: usize,
    pub connected_ports: Vec<u16>,
}

#[derive(Debug, Default)]
struct Counters {
    commands: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    reconnects: AtomicU64,
    server_restarts: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default)]
struct PoolState {
    serials: HashMap<u16, String>,
    connected: BTreeSet<u16>,
}

/// Owns bridge connections keyed by port.
pub struct BridgeConnectionPool<B> {
    bridge: B,
    settings: PoolSettings,
    state: Mutex<PoolState>,
    counters: Counters,
}

impl<B: DeviceBridge> BridgeConnectionPool<B> {
    pub fn new(bridge: B, settings: PoolSettings) -> Self {
        Self {
            bridge,
            settings,
            state: Mutex::default(),
            counters: Counters::default(),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    fn state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn address(&self, port: u16) -> String {
        canonical_serial(&self.settings.host, port)
    }

    /// Await `fut`, mapping a missed deadline to `FleetError::CommandTimeout`.
    async fn bounded(
        &self,
        command: String,
        timeout: Duration,
        fut: impl Future<Output = Result<Output>>,
    ) -> Result<Output> {
        let result = match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(FleetError::CommandTimeout { command, timeout }.into()),
        };
        if let Err(err) = &result {
            if matches!(FleetError::find(err), Some(FleetError::CommandTimeout { .. })) {
                bump(&self.counters.timeouts);
            }
        }
        result
    }

    // ── Device listing ───────────────────────────────────────────────────────

    /// Current `devices` listing.
    ///
    /// If the listing itself fails the daemon is assumed crashed: the server
    /// is restarted once and the listing retried.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing still fails after the restart.
    pub async fn devices(&self) -> Result<Vec<BridgeDevice>> {
        match self.list_devices().await {
            Ok(devices) => Ok(devices),
            Err(err) => {
                tracing::warn!("bridge devices failed ({err:#}); restarting bridge server");
                self.restart_server().await?;
                self.list_devices().await
            }
        }
    }

    async fn list_devices(&self) -> Result<Vec<BridgeDevice>> {
        let output = self
            .bounded("devices".into(), CONTROL_TIMEOUT, self.bridge.devices())
            .await?;
        if !output.status.success() {
            return Err(FleetError::BridgeFailed {
                operation: "devices".into(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }
        Ok(parse_devices(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Distinct ports with a ready device. Aliases count once.
    ///
    /// # Errors
    ///
    /// Propagates [`devices`](Self::devices) failures.
    pub async fn live_ports(&self) -> Result<BTreeSet<u16>> {
        Ok(live_ports(&self.devices().await?))
    }

    /// `kill-server` then `start-server`. Drops every cached serial.
    ///
    /// # Errors
    ///
    /// Returns an error if either call cannot be run.
    pub async fn restart_server(&self) -> Result<()> {
        bump(&self.counters.server_restarts);
        self.bounded("kill-server".into(), CONTROL_TIMEOUT, self.bridge.kill_server())
            .await
            .context("stopping bridge server")?;
        self.bounded("start-server".into(), CONTROL_TIMEOUT, self.bridge.start_server())
            .await
            .context("starting bridge server")?;
        let mut state = self.state();
        state.serials.clear();
        state.connected.clear();
        Ok(())
    }

    // ── Serial resolution ────────────────────────────────────────────────────

    /// Serial for `port`, from the cache when possible.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::DeviceNotFound`] if no ready device exists.
    pub async fn resolve_serial(&self, port: u16) -> Result<String> {
        self.resolve_serial_with(port, false).await
    }

    async fn resolve_serial_with(&self, port: u16, skip_cache: bool) -> Result<String> {
        if !skip_cache {
            if let Some(serial) = self.state().serials.get(&port).cloned() {
                bump(&self.counters.cache_hits);
                return Ok(serial);
            }
        }
        bump(&self.counters.cache_misses);
        let devices = self.devices().await?;
        let choice = select_serial(port, &self.settings.host, &devices)
            .ok_or_else(|| FleetError::DeviceNotFound(format!("port {port}")))?;
        if choice.matched == SerialMatch::Fallback {
            tracing::warn!(port, serial = %choice.serial, "no device on port; using first ready device");
        } else {
            self.state().serials.insert(port, choice.serial.clone());
        }
        Ok(choice.serial)
    }

    /// Serial currently listed for `port`, without falling back to other
    /// devices and without touching the cache.
    ///
    /// # Errors
    ///
    /// Propagates [`devices`](Self::devices) failures.
    pub async fn serial_on(&self, port: u16) -> Result<Option<String>> {
        let devices = self.devices().await?;
        Ok(select_serial(port, &self.settings.host, &devices)
            .filter(|choice| choice.matched != SerialMatch::Fallback)
            .map(|choice| choice.serial))
    }

    async fn serial_for(&self, target: &DeviceAddress, skip_cache: bool) -> Result<String> {
        match target {
            DeviceAddress::Port(port) => self.resolve_serial_with(*port, skip_cache).await,
            DeviceAddress::Serial(serial) => Ok(serial.clone()),
        }
    }

    /// Forget every cached serial.
    pub fn clear_cache(&self) {
        self.state().serials.clear();
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        let state = self.state();
        PoolStats {
            commands: load(&self.counters.commands),
            failures: load(&self.counters.failures),
            timeouts: load(&self.counters.timeouts),
            cache_hits: load(&self.counters.cache_hits),
            cache_misses: load(&self.counters.cache_misses),
            reconnects: load(&self.counters.reconnects),
            server_restarts: load(&self.counters.server_restarts),
            cached_serials: state.serials.len(),
            connected_ports: state.connected.iter().copied().collect(),
        }
    }

    // ── Connections ──────────────────────────────────────────────────────────

    /// Connect to `port` using the pool's connect policy.
    ///
    /// # Errors
    ///
    /// See [`connect_with`](Self::connect_with).
    pub async fn connect(&self, port: u16) -> Result<String> {
        self.connect_with(port, self.settings.connect_policy).await
    }

    /// Connect to `port`, verifying after each attempt that a ready device
    /// actually appears on it. Stale offline entries for the port are
    /// disconnected first.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::BridgeConnectionLost`] (or the last connect
    /// failure) once `policy` is exhausted.
    pub async fn connect_with(&self, port: u16, policy: RetryPolicy) -> Result<String> {
        let address = self.address(port);
        if let Ok(devices) = self.devices().await {
            for serial in stale_serials(port, &devices) {
                tracing::debug!(%serial, "disconnecting stale entry");
                if let Err(err) = self.disconnect_serial(&serial).await {
                    tracing::debug!(%serial, "stale disconnect failed: {err:#}");
                }
            }
        }

        let what = format!("connect {address}");
        let serial = retry(policy, None, &what, |attempt| {
            let address = address.clone();
            async move {
                if attempt > 1 {
                    bump(&self.counters.reconnects);
                }
                self.connect_once(port, &address).await
            }
        })
        .await
        .map_err(|exhausted| exhausted.last)?;

        let mut state = self.state();
        state.serials.insert(port, serial.clone());
        state.connected.insert(port);
        Ok(serial)
    }

    async fn connect_once(&self, port: u16, address: &str) -> Result<String> {
        let output = self
            .bounded(format!("connect {address}"), CONTROL_TIMEOUT, self.bridge.connect(address))
            .await?;
        let text = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        match parse_connect_output(&text) {
            ConnectOutcome::Connected | ConnectOutcome::AlreadyConnected => {}
            ConnectOutcome::Failed(detail) => {
                return Err(FleetError::BridgeFailed {
                    operation: format!("connect {address}"),
                    detail,
                }
                .into());
            }
        }
        let devices = self.devices().await?;
        match select_serial(port, &self.settings.host, &devices) {
            Some(choice) if choice.matched != SerialMatch::Fallback => Ok(choice.serial),
            _ => Err(FleetError::BridgeConnectionLost {
                name: address.to_string(),
                port,
            }
            .into()),
        }
    }

    /// Disconnect `port` and forget its cached serial.
    ///
    /// # Errors
    ///
    /// Returns an error only if the bridge cannot be invoked; "not connected"
    /// replies are treated as success.
    pub async fn disconnect(&self, port: u16) -> Result<()> {
        {
            let mut state = self.state();
            state.serials.remove(&port);
            state.connected.remove(&port);
        }
        self.disconnect_serial(&self.address(port)).await
    }

    async fn disconnect_serial(&self, serial: &str) -> Result<()> {
        let output = self
            .bounded(format!("disconnect {serial}"), CONTROL_TIMEOUT, self.bridge.disconnect(serial))
            .await?;
        if !output.status.success() {
            tracing::debug!(
                serial,
                "disconnect: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    /// Disconnect every port this pool connected.
    pub async fn disconnect_all(&self) {
        let ports: Vec<u16> = self.state().connected.iter().copied().collect();
        for port in ports {
            if let Err(err) = self.disconnect(port).await {
                tracing::warn!(port, "disconnect failed: {err:#}");
            }
        }
    }

    // ── Commands ─────────────────────────────────────────────────────────────

    /// Run a shell command and return its stdout.
    ///
    /// A failure on a cached serial drops the cache entry and retries once
    /// with fresh resolution.
    ///
    /// # Errors
    ///
    /// [`FleetError::CommandTimeout`] when the call outlives its timeout,
    /// [`FleetError::DeviceNotFound`] when the target cannot be resolved, and
    /// [`FleetError::BridgeFailed`] when the command exits non-zero.
    pub async fn execute(
        &self,
        target: &DeviceAddress,
        command: &str,
        options: ExecOptions,
    ) -> Result<String> {
        let timeout = options.timeout.unwrap_or(self.settings.shell_timeout);
        let serial = self.serial_for(target, options.skip_cache).await?;
        match self.shell(&serial, command, timeout).await {
            Err(err) if self.is_stale(target, &err) => {
                let DeviceAddress::Port(port) = target else {
                    return Err(err);
                };
                tracing::debug!(port, "cached serial failed; re-resolving");
                self.state().serials.remove(port);
                let serial = self.resolve_serial_with(*port, true).await?;
                self.shell(&serial, command, timeout).await
            }
            result => result,
        }
    }

    /// Run several commands against one device, resolving it once.
    /// Stops at the first failure.
    ///
    /// # Errors
    ///
    /// As [`execute`](Self::execute).
    pub async fn execute_batch(
        &self,
        target: &DeviceAddress,
        commands: &[&str],
        options: ExecOptions,
    ) -> Result<Vec<String>> {
        let timeout = options.timeout.unwrap_or(self.settings.shell_timeout);
        let serial = self.serial_for(target, options.skip_cache).await?;
        let mut outputs = Vec::with_capacity(commands.len());
        for command in commands {
            let out = self
                .shell(&serial, command, timeout)
                .await
                .with_context(|| format!("batch command `{command}`"))?;
            outputs.push(out);
        }
        Ok(outputs)
    }

    fn is_stale(&self, target: &DeviceAddress, err: &anyhow::Error) -> bool {
        let DeviceAddress::Port(port) = target else {
            return false;
        };
        let cached = self.state().serials.contains_key(port);
        cached
            && matches!(
                FleetError::find(err),
                Some(FleetError::BridgeFailed { detail, .. })
                    if detail.contains("not found") || detail.contains("offline")
            )
    }

    async fn shell(&self, serial: &str, command: &str, timeout: Duration) -> Result<String> {
        bump(&self.counters.commands);
        let output = self
            .bounded(
                format!("-s {serial} shell {command}"),
                timeout,
                self.bridge.shell(serial, command, timeout),
            )
            .await
            .inspect_err(|_| bump(&self.counters.failures))?;
        if !output.status.success() {
            bump(&self.counters.failures);
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let detail = if stderr.is_empty() {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            } else {
                stderr
            };
            return Err(FleetError::BridgeFailed {
                operation: format!("shell `{command}` on {serial}"),
                detail,
            }
            .into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    // ── Input helpers (interactive timeout) ──────────────────────────────────

    fn interactive(&self) -> ExecOptions {
        ExecOptions {
            timeout: Some(self.settings.interactive_timeout),
            skip_cache: false,
        }
    }

    /// # Errors
    ///
    /// As [`execute`](Self::execute).
    pub async fn tap(&self, target: &DeviceAddress, x: u32, y: u32) -> Result<()> {
        self.execute(target, &format!("input tap {x} {y}"), self.interactive())
            .await
            .map(drop)
    }

    /// # Errors
    ///
    /// As [`execute`](Self::execute).
    pub async fn swipe(
        &self,
        target: &DeviceAddress,
        from: (u32, u32),
        to: (u32, u32),
        duration: Duration,
    ) -> Result<()> {
        let command = format!(
            "input swipe {} {} {} {} {}",
            from.0,
            from.1,
            to.0,
            to.1,
            duration.as_millis()
        );
        self.execute(target, &command, self.interactive())
            .await
            .map(drop)
    }

    /// # Errors
    ///
    /// As [`execute`](Self::execute).
    pub async fn keyevent(&self, target: &DeviceAddress, code: u32) -> Result<()> {
        self.execute(target, &format!("input keyevent {code}"), self.interactive())
            .await
            .map(drop)
    }

    /// Type `text`; spaces become `%s` and the rest is single-quoted.
    ///
    /// # Errors
    ///
    /// As [`execute`](Self::execute).
    pub async fn input_text(&self, target: &DeviceAddress, text: &str) -> Result<()> {
        let escaped = text.replace(' ', "%s").replace('\'', r"'\''");
        self.execute(target, &format!("input text '{escaped}'"), self.interactive())
            .await
            .map(drop)
    }

    // ── Transfers (transfer timeout) ─────────────────────────────────────────

    /// # Errors
    ///
    /// [`FleetError::CommandTimeout`] or [`FleetError::BridgeFailed`].
    pub async fn pull(&self, target: &DeviceAddress, remote: &str, local: &str) -> Result<()> {
        let serial = self.serial_for(target, false).await?;
        let timeout = self.settings.transfer_timeout;
        let output = self
            .bounded(
                format!("-s {serial} pull {remote}"),
                timeout,
                self.bridge.pull(&serial, remote, local, timeout),
            )
            .await?;
        transfer_result("pull", &output)
    }

    /// # Errors
    ///
    /// [`FleetError::CommandTimeout`] or [`FleetError::BridgeFailed`].
    pub async fn push(&self, target: &DeviceAddress, local: &str, remote: &str) -> Result<()> {
        let serial = self.serial_for(target, false).await?;
        let timeout = self.settings.transfer_timeout;
        let output = self
            .bounded(
                format!("-s {serial} push {local}"),
                timeout,
                self.bridge.push(&serial, local, remote, timeout),
            )
            .await?;
        transfer_result("push", &output)
    }

    /// # Errors
    ///
    /// [`FleetError::CommandTimeout`] or [`FleetError::BridgeFailed`].
    pub async fn install(&self, target: &DeviceAddress, package: &str) -> Result<()> {
        let serial = self.serial_for(target, false).await?;
        let timeout = self.settings.transfer_timeout;
        let output = self
            .bounded(
                format!("-s {serial} install {package}"),
                timeout,
                self.bridge.install(&serial, package, timeout),
            )
            .await?;
        transfer_result("install", &output)
    }
}

fn transfer_result(operation: &str, output: &Output) -> Result<()> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    // `install` prints "Failure [...]" with a zero exit on some versions.
    if output.status.success() && !stdout.contains("Failure") {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let detail = if stderr.trim().is_empty() { stdout } else { stderr };
    Err(FleetError::BridgeFailed {
        operation: operation.to_string(),
        detail: detail.trim().to_string(),
    }
    .into())
}
