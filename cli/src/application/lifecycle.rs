//! Instance lifecycle orchestration.
//!
//! `LifecycleController` drives the console through the phase machine in
//! `domain::instance`, using the pool for every bridge interaction and the
//! registry for identity. Calls against one name are serialized by an
//! internal per-name mutex; different names proceed in parallel.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::application::pool::{BridgeConnectionPool, DeviceAddress, ExecOptions, KEYCODE_HOME};
use crate::application::ports::{DeviceBridge, InstanceConsole};
use crate::application::registry::InstanceRegistry;
use crate::application::retry::{Exhausted, retry};
use crate::domain::bridge::{BridgeDevice, live_ports};
use crate::domain::config::FleetConfig;
use crate::domain::console::{ConsoleEntry, parse_names};
use crate::domain::error::FleetError;
use crate::domain::instance::{Instance, InstanceConfig, LifecyclePhase, validate_instance_name};
use crate::domain::port::PortResolution;
use crate::domain::retry::RetryPolicy;

/// Console property re-asserted on every launch so the bridge can attach.
pub const BRIDGE_DEBUG_KEY: &str = "adb_debug";

/// Controller-wide timing and retry settings.
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub launch_policy: RetryPolicy,
    pub launch_timeout: Duration,
    pub boot_timeout: Duration,
    pub stop_timeout: Duration,
    pub restart_settle: Duration,
    /// Interval of the boot-wait and quit-verification loops.
    pub poll_interval: Duration,
    /// Shell command used as the post-connect health probe.
    pub health_probe: String,
}

impl LifecycleSettings {
    #[must_use]
    pub fn from_config(config: &FleetConfig) -> Self {
        Self {
            launch_policy: config.retry.launch_policy(),
            launch_timeout: config.timeouts.launch(),
            boot_timeout: config.timeouts.boot(),
            stop_timeout: config.timeouts.stop(),
            restart_settle: config.timeouts.restart_settle(),
            poll_interval: Duration::from_secs(1),
            health_probe: "echo ok".to_string(),
        }
    }
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self::from_config(&FleetConfig::default())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LaunchOptions {
    /// Total attempts including the first.
    pub retry_count: u32,
    /// Run the shell probe after connecting.
    pub verify_health: bool,
    /// Wall-clock budget for every attempt together.
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct StopOptions {
    /// Press HOME before quitting.
    pub force_cleanup: bool,
    /// How long to wait for the console to stop listing the instance.
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct RestartOptions {
    pub timeout: Duration,
}

/// Result of [`LifecycleController::clone_instance`].
#[derive(Debug)]
pub struct CloneOutcome {
    /// The registered copy.
    pub instance: Instance,
    /// Background relaunch of the source, when it had been running.
    pub source_restart: Option<JoinHandle<Result<Instance>>>,
}

impl CloneOutcome {
    /// Wait for the source relaunch, if any.
    ///
    /// # Errors
    ///
    /// Returns the relaunch error, or an error if the task panicked.
    pub async fn join_source_restart(&mut self) -> Result<()> {
        if let Some(handle) = self.source_restart.take() {
            handle.await.context("source relaunch task failed")??;
        }
        Ok(())
    }
}

/// One async mutex per instance name.
#[derive(Debug, Default)]
struct NameLocks(Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>);

impl NameLocks {
    async fn acquire(&self, name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.0.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(map.entry(name.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Forget `name`'s mutex unless a caller still holds or awaits it.
    fn evict(&self, name: &str) {
        let mut map = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if map.get(name).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            map.remove(name);
        }
    }

    /// Lock two names in sorted order so concurrent pairs cannot deadlock.
    async fn acquire_pair(&self, a: &str, b: &str) -> (OwnedMutexGuard<()>, OwnedMutexGuard<()>) {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        let first = self.acquire(first).await;
        let second = self.acquire(second).await;
        (first, second)
    }
}

/// Drives create/launch/stop/restart/clone/remove for the fleet.
pub struct LifecycleController<C, B> {
    console: Arc<C>,
    pool: Arc<BridgeConnectionPool<B>>,
    registry: Arc<InstanceRegistry>,
    settings: Arc<LifecycleSettings>,
    locks: Arc<NameLocks>,
}

impl<C, B> Clone for LifecycleController<C, B> {
    fn clone(&self) -> Self {
        Self {
            console: Arc::clone(&self.console),
            pool: Arc::clone(&self.pool),
            registry: Arc::clone(&self.registry),
            settings: Arc::clone(&self.settings),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<C, B> LifecycleController<C, B>
where
    C: InstanceConsole + 'static,
    B: DeviceBridge + 'static,
{
    pub fn new(
        console: C,
        pool: BridgeConnectionPool<B>,
        registry: InstanceRegistry,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            console: Arc::new(console),
            pool: Arc::new(pool),
            registry: Arc::new(registry),
            settings: Arc::new(settings),
            locks: Arc::default(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    #[must_use]
    pub fn pool(&self) -> &BridgeConnectionPool<B> {
        &self.pool
    }

    #[must_use]
    pub fn settings(&self) -> &LifecycleSettings {
        &self.settings
    }

    #[must_use]
    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            retry_count: self.settings.launch_policy.max_attempts,
            verify_health: true,
            timeout: self.settings.launch_timeout,
        }
    }

    #[must_use]
    pub fn stop_options(&self) -> StopOptions {
        StopOptions {
            force_cleanup: true,
            timeout: self.settings.stop_timeout,
        }
    }

    #[must_use]
    pub fn restart_options(&self) -> RestartOptions {
        RestartOptions {
            timeout: self.settings.launch_timeout,
        }
    }

    /// Registry snapshot ordered by index.
    #[must_use]
    pub fn get_instances(&self) -> Vec<Instance> {
        self.registry.all()
    }

    /// Rebuild the registry from the console.
    ///
    /// # Errors
    ///
    /// Propagates console failures.
    pub async fn refresh(&self) -> Result<Vec<ConsoleEntry>> {
        self.registry.refresh(&*self.console).await
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    /// Registry entry for `name`, rescanning the console once if missing.
    async fn identify(&self, name: &str) -> Result<Instance> {
        if let Some(inst) = self.registry.get(name) {
            return Ok(inst);
        }
        tracing::debug!(name, "not in registry; rescanning console");
        self.refresh().await?;
        Ok(self.registry.require(name)?)
    }

    async fn running_entries(&self) -> Result<Vec<ConsoleEntry>> {
        Ok(self
            .refresh()
            .await?
            .into_iter()
            .filter(ConsoleEntry::is_running)
            .collect())
    }

    /// Whether `runninglist` includes `name`. Enumeration failures count as
    /// running so callers still attempt the quit.
    async fn console_lists_running(&self, name: &str) -> bool {
        match self.console.running_list().await {
            Ok(out) => parse_names(&String::from_utf8_lossy(&out.stdout))
                .iter()
                .any(|n| n == name),
            Err(err) => {
                tracing::debug!(name, "runninglist failed: {err:#}");
                true
            }
        }
    }

    /// Move to `next`, first resetting a leftover phase to `reset` when the
    /// direct move is illegal (a previous process may have died mid-call).
    fn enter(&self, name: &str, next: LifecyclePhase, reset: LifecyclePhase) -> Result<()> {
        match self.registry.transition(name, next) {
            Err(FleetError::InvalidTransition { from, .. }) => {
                tracing::debug!(name, %from, %reset, "resetting leftover phase");
                self.registry.reconcile_phase(name, reset);
                Ok(self.registry.transition(name, next)?)
            }
            other => Ok(other?),
        }
    }

    /// Live port owned by `inst`: the cached port if live, else whatever the
    /// resolver arbitrates among devices not already held by another running
    /// instance.
    fn port_for(
        &self,
        inst: &Instance,
        devices: &[BridgeDevice],
        running: &[ConsoleEntry],
    ) -> Option<u16> {
        if live_ports(devices).contains(&inst.port) {
            return Some(inst.port);
        }
        self.arbitrate_port(inst, devices, running)
            .map(|resolution| resolution.port)
    }

    /// Run the resolver over live devices minus ports held by other running
    /// instances, so an adopted neighbour's port is never taken.
    fn arbitrate_port(
        &self,
        inst: &Instance,
        devices: &[BridgeDevice],
        running: &[ConsoleEntry],
    ) -> Option<PortResolution> {
        let claimed: BTreeSet<u16> = self
            .registry
            .all()
            .into_iter()
            .filter(|other| other.name != inst.name && other.phase == LifecyclePhase::Running)
            .map(|other| other.port)
            .collect();
        let unclaimed: Vec<BridgeDevice> = devices
            .iter()
            .filter(|d| d.port().is_none_or(|port| !claimed.contains(&port)))
            .cloned()
            .collect();
        let resolution = self
            .registry
            .resolver()
            .resolve_actual(&inst.name, inst.index, &unclaimed, running)?;
        tracing::debug!(name = %inst.name, port = resolution.port, source = ?resolution.source, "resolved port");
        Some(resolution)
    }

    // ── create ───────────────────────────────────────────────────────────────

    /// Create `name` and apply `config`.
    ///
    /// The console's exit code is advisory; the instance counts as created
    /// when the next enumeration lists it.
    ///
    /// # Errors
    ///
    /// [`FleetError::InvalidName`], [`FleetError::AlreadyExists`], or
    /// [`FleetError::ConsoleFailed`] when the instance never appears.
    pub async fn create(&self, name: &str, config: &InstanceConfig) -> Result<Instance> {
        validate_instance_name(name)?;
        let _guard = self.locks.acquire(name).await;

        let entries = self.refresh().await?;
        if entries.iter().any(|e| e.name == name) {
            return Err(FleetError::AlreadyExists(name.to_string()).into());
        }

        let output = self
            .console
            .add(name)
            .await
            .with_context(|| format!("creating '{name}'"))?;
        let entries = self.refresh().await?;
        if !entries.iter().any(|e| e.name == name) {
            return Err(FleetError::ConsoleFailed {
                operation: format!("add {name}"),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }
        if !output.status.success() {
            tracing::info!(name, "console reported failure but the instance exists; continuing");
        }

        let args = config.modify_args();
        if !args.is_empty() {
            match self.console.modify(name, &args).await {
                Ok(out) if out.status.success() => {}
                Ok(out) => tracing::warn!(
                    name,
                    "modify exited {}: {}",
                    out.status,
                    String::from_utf8_lossy(&out.stderr).trim()
                ),
                Err(err) => tracing::warn!(name, "modify failed: {err:#}"),
            }
        }

        let inst = self.registry.require(name)?;
        tracing::info!(name, index = inst.index, port = inst.port, "created");
        Ok(inst)
    }

    // ── launch ───────────────────────────────────────────────────────────────

    /// Launch `name` and wait until the bridge reaches it.
    ///
    /// Returns immediately when the instance is already running with a live
    /// bridge device.
    ///
    /// # Errors
    ///
    /// [`FleetError::InstanceNotFound`] when the console does not know the
    /// name, [`FleetError::LaunchFailed`] once retries are exhausted.
    pub async fn launch(&self, name: &str, options: &LaunchOptions) -> Result<Instance> {
        let _guard = self.locks.acquire(name).await;
        self.launch_locked(name, options).await
    }

    async fn launch_locked(&self, name: &str, options: &LaunchOptions) -> Result<Instance> {
        let deadline = Instant::now() + options.timeout;

        if let Some(inst) = self.already_running(name).await {
            tracing::info!(name, port = inst.port, "already running");
            return Ok(inst);
        }

        let policy = self
            .settings
            .launch_policy
            .with_max_attempts(options.retry_count);
        let what = format!("launch {name}");
        let result = retry(policy, Some(deadline), &what, |attempt| {
            self.launch_attempt(name, attempt, options, deadline)
        })
        .await;

        match result {
            Ok(inst) => {
                tracing::info!(name, port = inst.port, "running");
                Ok(inst)
            }
            Err(Exhausted { attempts, last }) => {
                if FleetError::find(&last).is_some_and(|e| !e.is_retryable()) {
                    return Err(last);
                }
                Err(FleetError::LaunchFailed {
                    name: name.to_string(),
                    attempts,
                    last_error: format!("{last:#}"),
                }
                .into())
            }
        }
    }

    /// Running in the console, booted, and reachable over the bridge.
    async fn already_running(&self, name: &str) -> Option<Instance> {
        let entries = self.refresh().await.ok()?;
        let entry = entries.iter().find(|e| e.name == name)?;
        if !entry.is_running() || !entry.android_started {
            return None;
        }
        let inst = self.registry.get(name)?;
        let devices = self.pool.devices().await.ok()?;
        let running: Vec<ConsoleEntry> = entries.into_iter().filter(ConsoleEntry::is_running).collect();
        let port = self.port_for(&inst, &devices, &running)?;
        self.registry.set_port(name, port);
        self.registry.reconcile_phase(name, LifecyclePhase::Running);
        self.registry.get(name)
    }

    async fn launch_attempt(
        &self,
        name: &str,
        attempt: u32,
        options: &LaunchOptions,
        deadline: Instant,
    ) -> Result<Instance> {
        tracing::info!(name, attempt, "launching");
        let result = self.launch_steps(name, options, deadline).await;
        if let Err(err) = &result {
            tracing::warn!(name, attempt, "launch attempt failed: {err:#}");
            if self.registry.transition(name, LifecyclePhase::Failed).is_ok() {
                self.registry.reconcile_phase(name, LifecyclePhase::Stopped);
            }
        }
        result
    }

    async fn launch_steps(
        &self,
        name: &str,
        options: &LaunchOptions,
        deadline: Instant,
    ) -> Result<Instance> {
        let inst = self.identify(name).await?;
        self.enter(name, LifecyclePhase::Launching, LifecyclePhase::Stopped)?;

        let output = self
            .console
            .launch(inst.index)
            .await
            .with_context(|| format!("launching '{name}' (index {})", inst.index))?;
        if !output.status.success() {
            tracing::debug!(name, "console launch exited {}; waiting for boot anyway", output.status);
        }

        self.assert_bridge_debug(name).await;
        self.registry.transition(name, LifecyclePhase::Booting)?;

        let remaining = deadline.saturating_duration_since(Instant::now());
        self.wait_for_boot(name, self.settings.boot_timeout.min(remaining))
            .await?;

        self.registry.transition(name, LifecyclePhase::Connecting)?;
        let port = self.connect_instance(name).await?;

        self.registry.transition(name, LifecyclePhase::Verifying)?;
        if options.verify_health {
            self.health_probe(name, port).await;
        }
        self.registry.transition(name, LifecyclePhase::Running)?;
        Ok(self.registry.require(name)?)
    }

    async fn assert_bridge_debug(&self, name: &str) {
        match self.console.setprop(name, BRIDGE_DEBUG_KEY, "1").await {
            Ok(out) if out.status.success() => {}
            Ok(out) => tracing::warn!(name, "setprop {BRIDGE_DEBUG_KEY} exited {}", out.status),
            Err(err) => tracing::warn!(name, "setprop {BRIDGE_DEBUG_KEY} failed: {err:#}"),
        }
    }

    /// Poll the console until `name` reports boot complete.
    async fn wait_for_boot(&self, name: &str, budget: Duration) -> Result<()> {
        let deadline = Instant::now() + budget;
        loop {
            match self.refresh().await {
                Ok(entries) => match entries.iter().find(|e| e.name == name) {
                    Some(entry) if entry.android_started => return Ok(()),
                    Some(_) => {}
                    None => {
                        return Err(FleetError::InstanceNotFound {
                            name: name.to_string(),
                            known: entries.into_iter().map(|e| e.name).collect(),
                        }
                        .into());
                    }
                },
                Err(err) => tracing::debug!(name, "boot poll failed: {err:#}"),
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                anyhow::bail!(
                    "'{name}' did not finish booting within {}s",
                    budget.as_secs()
                );
            }
            tokio::time::sleep(self.settings.poll_interval.min(remaining)).await;
        }
    }

    /// Connect the bridge to `name`, adopting another live port when the
    /// cached one never answers.
    async fn connect_instance(&self, name: &str) -> Result<u16> {
        let inst = self.registry.require(name)?;
        let err = match self.pool.connect(inst.port).await {
            Ok(_) => return Ok(inst.port),
            Err(err) => err,
        };

        let devices = self.pool.devices().await?;
        let running = self.running_entries().await?;
        match self.arbitrate_port(&inst, &devices, &running) {
            Some(resolution) if resolution.port != inst.port => {
                tracing::info!(
                    name,
                    expected = inst.port,
                    port = resolution.port,
                    source = ?resolution.source,
                    "instance answered on another port"
                );
                self.pool.connect(resolution.port).await?;
                self.registry.set_port(name, resolution.port);
                Ok(resolution.port)
            }
            _ => Err(err),
        }
    }

    async fn health_probe(&self, name: &str, port: u16) {
        let options = ExecOptions {
            timeout: None,
            skip_cache: true,
        };
        if let Err(err) = self
            .pool
            .execute(&DeviceAddress::Port(port), &self.settings.health_probe, options)
            .await
        {
            tracing::warn!(name, port, "health probe failed: {err:#}");
        }
    }

    // ── stop ─────────────────────────────────────────────────────────────────

    /// Stop `name`. Idempotent: stopping a stopped instance succeeds.
    ///
    /// The bridge is disconnected before the console quit. The instance is
    /// marked stopped at the end even when the quit could not be confirmed.
    ///
    /// # Errors
    ///
    /// [`FleetError::InstanceNotFound`] when the console does not know the name.
    pub async fn stop(&self, name: &str, options: &StopOptions) -> Result<()> {
        let _guard = self.locks.acquire(name).await;
        self.stop_locked(name, options).await
    }

    async fn stop_locked(&self, name: &str, options: &StopOptions) -> Result<()> {
        let inst = self.identify(name).await?;
        let deadline = Instant::now() + options.timeout;

        if !self.console_lists_running(name).await {
            if let Err(err) = self.pool.disconnect(inst.port).await {
                tracing::debug!(name, "disconnect of stopped instance failed: {err:#}");
            }
            self.registry.reconcile_phase(name, LifecyclePhase::Stopped);
            tracing::info!(name, "already stopped");
            return Ok(());
        }

        self.enter(name, LifecyclePhase::Stopping, LifecyclePhase::Running)?;

        if let Err(err) = self.pool.disconnect(inst.port).await {
            tracing::warn!(name, port = inst.port, "bridge disconnect failed: {err:#}");
        }
        if options.force_cleanup {
            self.press_home(name, inst.port).await;
        }

        match self.console.quit(name).await {
            Ok(out) if !out.status.success() => {
                tracing::debug!(name, "console quit exited {}", out.status);
            }
            Ok(_) => {}
            Err(err) => tracing::warn!(name, "console quit failed: {err:#}"),
        }

        let confirmed = self.wait_for_quit(name, deadline).await;
        self.registry.reconcile_phase(name, LifecyclePhase::Stopped);
        if confirmed {
            tracing::info!(name, "stopped");
        } else {
            tracing::warn!(
                name,
                "still listed as running after {}s; marked stopped anyway",
                options.timeout.as_secs()
            );
        }
        Ok(())
    }

    /// Best-effort HOME key so foreground apps are not killed mid-write.
    async fn press_home(&self, name: &str, port: u16) {
        let serial = match self.pool.serial_on(port).await {
            Ok(Some(serial)) => serial,
            Ok(None) => {
                tracing::debug!(name, "no serial left on port {port}; skipping HOME");
                return;
            }
            Err(err) => {
                tracing::debug!(name, "skipping HOME: {err:#}");
                return;
            }
        };
        if let Err(err) = self
            .pool
            .keyevent(&DeviceAddress::Serial(serial), KEYCODE_HOME)
            .await
        {
            tracing::debug!(name, "HOME key failed: {err:#}");
        }
    }

    /// Poll `runninglist` until `name` disappears. An enumeration failure
    /// counts as stopped.
    async fn wait_for_quit(&self, name: &str, deadline: Instant) -> bool {
        loop {
            match self.console.running_list().await {
                Ok(out) => {
                    let names = parse_names(&String::from_utf8_lossy(&out.stdout));
                    if !names.iter().any(|n| n == name) {
                        return true;
                    }
                }
                Err(err) => {
                    tracing::debug!(name, "runninglist failed, assuming stopped: {err:#}");
                    return true;
                }
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            tokio::time::sleep(self.settings.poll_interval.min(remaining)).await;
        }
    }

    // ── restart ──────────────────────────────────────────────────────────────

    /// Stop without app cleanup, settle, then launch with one fewer attempt,
    /// all inside `options.timeout`.
    ///
    /// # Errors
    ///
    /// As [`stop`](Self::stop) and [`launch`](Self::launch).
    pub async fn restart(&self, name: &str, options: &RestartOptions) -> Result<Instance> {
        let _guard = self.locks.acquire(name).await;
        let deadline = Instant::now() + options.timeout;

        let stop = StopOptions {
            force_cleanup: false,
            timeout: self.settings.stop_timeout.min(options.timeout),
        };
        self.stop_locked(name, &stop).await?;

        let remaining = deadline.saturating_duration_since(Instant::now());
        tokio::time::sleep(self.settings.restart_settle.min(remaining)).await;

        let launch = LaunchOptions {
            retry_count: self
                .settings
                .launch_policy
                .max_attempts
                .saturating_sub(1)
                .max(1),
            verify_health: true,
            timeout: deadline.saturating_duration_since(Instant::now()),
        };
        self.launch_locked(name, &launch).await
    }

    // ── clone ────────────────────────────────────────────────────────────────

    /// Copy `source` into `target`, replacing any existing `target`.
    ///
    /// A running source is stopped for the copy and relaunched in the
    /// background. Success is decided by enumeration alone: the console's
    /// copy command reports errors it did not have.
    ///
    /// # Errors
    ///
    /// [`FleetError::InstanceNotFound`] for an unknown source,
    /// [`FleetError::CloneVerificationFailed`] when `target` is not listed
    /// after the copy.
    pub async fn clone_instance(&self, source: &str, target: &str) -> Result<CloneOutcome> {
        validate_instance_name(target)?;
        if source == target {
            return Err(FleetError::AlreadyExists(target.to_string()).into());
        }
        let (_a, _b) = self.locks.acquire_pair(source, target).await;

        let entries = self.refresh().await?;
        let Some(origin) = entries.iter().find(|e| e.name == source).cloned() else {
            return Err(FleetError::InstanceNotFound {
                name: source.to_string(),
                known: entries.into_iter().map(|e| e.name).collect(),
            }
            .into());
        };

        if entries.iter().any(|e| e.name == target) {
            tracing::info!(target, "target exists; removing before copy");
            self.remove_locked(target)
                .await
                .with_context(|| format!("removing existing '{target}'"))?;
        }

        let was_running = origin.is_running();
        if was_running {
            let stop = StopOptions {
                force_cleanup: false,
                timeout: self.settings.stop_timeout,
            };
            self.stop_locked(source, &stop).await?;
        }

        match self.console.copy(target, source).await {
            Ok(out) if out.status.success() => {}
            Ok(out) => tracing::warn!(
                source,
                target,
                "copy exited {}; verifying through enumeration",
                out.status
            ),
            Err(err) => tracing::warn!(source, target, "copy failed: {err:#}; verifying anyway"),
        }

        let source_restart = was_running.then(|| self.spawn_relaunch(source));

        let entries = self.refresh().await?;
        if !entries.iter().any(|e| e.name == target) {
            return Err(FleetError::CloneVerificationFailed {
                origin: source.to_string(),
                target: target.to_string(),
            }
            .into());
        }
        let instance = self.registry.require(target)?;
        tracing::info!(source, target, index = instance.index, "cloned");
        Ok(CloneOutcome {
            instance,
            source_restart,
        })
    }

    fn spawn_relaunch(&self, name: &str) -> JoinHandle<Result<Instance>> {
        let this = self.clone();
        let name = name.to_string();
        tokio::spawn(async move {
            let _guard = this.locks.acquire(&name).await;
            let options = this.launch_options();
            this.launch_locked(&name, &options).await
        })
    }

    // ── remove ───────────────────────────────────────────────────────────────

    /// Remove `name`. A name the console no longer lists is only dropped
    /// from the registry.
    ///
    /// # Errors
    ///
    /// [`FleetError::ConsoleFailed`] when the console still lists the
    /// instance after removal.
    pub async fn remove(&self, name: &str) -> Result<()> {
        let result = {
            let _guard = self.locks.acquire(name).await;
            self.remove_locked(name).await
        };
        if result.is_ok() {
            self.locks.evict(name);
        }
        result
    }

    async fn remove_locked(&self, name: &str) -> Result<()> {
        let entries = self.refresh().await?;
        let Some(entry) = entries.iter().find(|e| e.name == name) else {
            self.registry.remove(name);
            tracing::info!(name, "not listed by the console; dropped from registry");
            return Ok(());
        };

        if entry.is_running() {
            let stop = StopOptions {
                force_cleanup: false,
                timeout: self.settings.stop_timeout,
            };
            if let Err(err) = self.stop_locked(name, &stop).await {
                tracing::warn!(name, "stop before remove failed: {err:#}");
            }
        }

        let output = self
            .console
            .remove(name)
            .await
            .with_context(|| format!("removing '{name}'"))?;
        let entries = self.refresh().await?;
        if entries.iter().any(|e| e.name == name) {
            return Err(FleetError::ConsoleFailed {
                operation: format!("remove {name}"),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }
        self.registry.remove(name);
        tracing::info!(name, "removed");
        Ok(())
    }

    // ── reconciliation ───────────────────────────────────────────────────────

    /// Reconcile `name` against the console and the bridge.
    ///
    /// A running instance without a live bridge device gets one reconnect
    /// attempt on its cached port. A stopped instance loses any bridge
    /// connection still listed on that port.
    ///
    /// # Errors
    ///
    /// [`FleetError::InstanceNotFound`], or
    /// [`FleetError::BridgeConnectionLost`] when the reconnect fails.
    pub async fn sync_state(&self, name: &str) -> Result<Instance> {
        let _guard = self.locks.acquire(name).await;

        let entries = self.refresh().await?;
        let Some(entry) = entries.iter().find(|e| e.name == name) else {
            return Err(FleetError::InstanceNotFound {
                name: name.to_string(),
                known: entries.into_iter().map(|e| e.name).collect(),
            }
            .into());
        };
        let inst = self.registry.require(name)?;

        if !entry.is_running() {
            self.registry.reconcile_phase(name, LifecyclePhase::Stopped);
            match self.pool.live_ports().await {
                Ok(live) if live.contains(&inst.port) => {
                    tracing::debug!(name, port = inst.port, "dropping bridge connection of stopped instance");
                    if let Err(err) = self.pool.disconnect(inst.port).await {
                        tracing::warn!(name, "disconnect failed: {err:#}");
                    }
                }
                Ok(_) => {}
                Err(err) => tracing::debug!(name, "devices failed: {err:#}"),
            }
            return Ok(self.registry.require(name)?);
        }

        let running: Vec<ConsoleEntry> = entries.into_iter().filter(ConsoleEntry::is_running).collect();
        let devices = self.pool.devices().await?;
        self.registry.reconcile_phase(name, LifecyclePhase::Running);
        if let Some(port) = self.port_for(&inst, &devices, &running) {
            self.registry.set_port(name, port);
            return Ok(self.registry.require(name)?);
        }

        tracing::warn!(name, port = inst.port, "running without a bridge device; reconnecting once");
        if let Err(err) = self.pool.connect_with(inst.port, RetryPolicy::once()).await {
            tracing::warn!(name, "reconnect failed: {err:#}");
            return Err(FleetError::BridgeConnectionLost {
                name: name.to_string(),
                port: inst.port,
            }
            .into());
        }
        Ok(self.registry.require(name)?)
    }

    /// [`sync_state`](Self::sync_state) for every known instance. Individual
    /// failures are logged, not returned.
    ///
    /// # Errors
    ///
    /// Returns an error only if the console cannot be enumerated.
    pub async fn sync_all(&self) -> Result<()> {
        let entries = self.refresh().await?;
        for entry in entries {
            if let Err(err) = self.sync_state(&entry.name).await {
                tracing::warn!(name = %entry.name, "sync failed: {err:#}");
            }
        }
        Ok(())
    }

    // ── bridge access for collaborators ──────────────────────────────────────

    /// Live bridge port for `name`, connecting if nothing answers yet.
    ///
    /// # Errors
    ///
    /// [`FleetError::InstanceNotFound`] or
    /// [`FleetError::BridgeConnectionLost`].
    pub async fn get_adb_port_for_instance(&self, name: &str) -> Result<u16> {
        let inst = self.identify(name).await?;
        let running = self.running_entries().await?;
        let devices = self.pool.devices().await?;
        if let Some(port) = self.port_for(&inst, &devices, &running) {
            self.registry.set_port(name, port);
            return Ok(port);
        }
        if let Err(err) = self.pool.connect(inst.port).await {
            tracing::warn!(name, port = inst.port, "connect failed: {err:#}");
            return Err(FleetError::BridgeConnectionLost {
                name: name.to_string(),
                port: inst.port,
            }
            .into());
        }
        Ok(inst.port)
    }

    /// Run a shell command through the pool.
    ///
    /// # Errors
    ///
    /// As [`BridgeConnectionPool::execute`].
    pub async fn execute_command(
        &self,
        target: &DeviceAddress,
        command: &str,
        options: ExecOptions,
    ) -> Result<String> {
        self.pool.execute(target, command, options).await
    }
}
