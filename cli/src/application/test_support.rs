//! Simulated console + bridge shared by application-layer tests.
//!
//! [`FakeFleet`] keeps one in-memory world; [`FakeConsole`] and
//! [`FakeBridge`] are two views of it so a launch through the console is
//! visible to the bridge, the way the real tools behave.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::process::Output;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Result;

use crate::application::ports::{DeviceBridge, InstanceConsole};
use crate::domain::bridge::serial_port;

/// Build an `ExitStatus` from a logical exit code (cross-platform).
#[cfg(unix)]
pub fn exit_status(code: i32) -> std::process::ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    std::process::ExitStatus::from_raw(code << 8)
}

#[cfg(windows)]
pub fn exit_status(code: i32) -> std::process::ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    #[allow(clippy::cast_sign_loss)]
    std::process::ExitStatus::from_raw(code as u32)
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

#[derive(Debug, Clone)]
pub struct SimInstance {
    pub name: String,
    pub index: u32,
    pub running: bool,
    pub started: bool,
    /// `list2` scans left before a running instance reports boot complete.
    pub boot_countdown: u32,
}

#[derive(Debug)]
pub struct FleetSim {
    pub instances: Vec<SimInstance>,
    pub base_port: u16,
    /// `list2` scans a freshly launched instance needs before it is started.
    pub boot_scans: u32,
    /// Serials connected over TCP.
    pub connected: BTreeSet<String>,
    /// Also list `emulator-<port-1>` for every booted instance.
    pub emulator_aliases: bool,
    /// Instances that bind a bridge port other than the formula one.
    pub port_override: HashMap<String, u16>,
    /// Instances that launch but never finish booting.
    pub never_boot: HashSet<String>,
    /// Exit code returned by `add` (the instance is still created).
    pub add_exit_code: i32,
    /// Exit code returned by `copy`.
    pub copy_exit_code: i32,
    /// Whether `copy` actually creates the target.
    pub copy_creates_target: bool,
    /// `shell` never answers.
    pub hang_shell: bool,
    /// `devices` fails until the server is restarted.
    pub daemon_crashed: bool,
    /// How long a console `launch` call takes.
    pub launch_delay: Duration,
    pub launches_in_flight: u32,
    pub max_launches_in_flight: u32,
    /// Every call, in order, as `"<tool> <verb> <arg>"`.
    pub calls: Vec<String>,
}

impl Default for FleetSim {
    fn default() -> Self {
        Self {
            instances: Vec::new(),
            base_port: 5555,
            boot_scans: 1,
            connected: BTreeSet::new(),
            emulator_aliases: false,
            port_override: HashMap::new(),
            never_boot: HashSet::new(),
            add_exit_code: 0,
            copy_exit_code: 0,
            copy_creates_target: true,
            hang_shell: false,
            daemon_crashed: false,
            launch_delay: Duration::ZERO,
            launches_in_flight: 0,
            max_launches_in_flight: 0,
            calls: Vec::new(),
        }
    }
}

impl FleetSim {
    fn port_of(&self, inst: &SimInstance) -> u16 {
        self.port_override
            .get(&inst.name)
            .copied()
            .unwrap_or(self.base_port + u16::try_from(inst.index * 2).unwrap_or(0))
    }

    fn booted_on(&self, port: u16) -> bool {
        self.instances
            .iter()
            .any(|i| i.running && i.started && self.port_of(i) == port)
    }

    fn add_instance(&mut self, name: &str) {
        let index = self.instances.iter().map(|i| i.index + 1).max().unwrap_or(0);
        self.instances.push(SimInstance {
            name: name.to_string(),
            index,
            running: false,
            started: false,
            boot_countdown: 0,
        });
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut SimInstance> {
        self.instances.iter_mut().find(|i| i.name == name)
    }
}

/// Shared simulated world.
#[derive(Clone, Default)]
pub struct FakeFleet {
    state: Arc<Mutex<FleetSim>>,
}

impl FakeFleet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fleet with stopped instances at consecutive indices.
    pub fn with_instances(names: &[&str]) -> Self {
        let fleet = Self::new();
        {
            let mut sim = fleet.sim();
            for name in names {
                sim.add_instance(name);
            }
        }
        fleet
    }

    pub fn sim(&self) -> MutexGuard<'_, FleetSim> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn console(&self) -> FakeConsole {
        FakeConsole(self.clone())
    }

    pub fn bridge(&self) -> FakeBridge {
        FakeBridge(self.clone())
    }

    /// Mark an instance running and booted, bridge connected.
    pub fn boot(&self, name: &str) {
        let mut sim = self.sim();
        let snapshot = {
            let Some(inst) = sim.find_mut(name) else {
                return;
            };
            inst.running = true;
            inst.started = true;
            inst.clone()
        };
        let port = sim.port_of(&snapshot);
        sim.connected.insert(format!("127.0.0.1:{port}"));
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.sim().instances.iter().any(|i| i.name == name && i.running)
    }

    pub fn count_named(&self, name: &str) -> usize {
        self.sim().instances.iter().filter(|i| i.name == name).count()
    }

    pub fn calls(&self) -> Vec<String> {
        self.sim().calls.clone()
    }

    pub fn calls_matching(&self, prefix: &str) -> usize {
        self.sim().calls.iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) {
        self.sim().calls.push(call);
    }
}

pub struct FakeConsole(pub FakeFleet);

impl InstanceConsole for FakeConsole {
    async fn list2(&self) -> Result<Output> {
        let mut sim = self.0.sim();
        sim.calls.push("console list2".into());
        let never_boot = sim.never_boot.clone();
        let mut out = String::new();
        for inst in &mut sim.instances {
            if inst.running && !inst.started && !never_boot.contains(&inst.name) {
                if inst.boot_countdown == 0 {
                    inst.started = true;
                } else {
                    inst.boot_countdown -= 1;
                }
            }
            let pid = if inst.running {
                i64::from(1000 + inst.index)
            } else {
                -1
            };
            out.push_str(&format!(
                "{},{},0,0,{},{pid},{pid}\n",
                inst.index,
                inst.name,
                u8::from(inst.started)
            ));
        }
        Ok(ok_output(&out))
    }

    async fn running_list(&self) -> Result<Output> {
        let mut sim = self.0.sim();
        sim.calls.push("console runninglist".into());
        let out: String = sim
            .instances
            .iter()
            .filter(|i| i.running)
            .map(|i| format!("{}\n", i.name))
            .collect();
        Ok(ok_output(&out))
    }

    async fn add(&self, name: &str) -> Result<Output> {
        let mut sim = self.0.sim();
        sim.calls.push(format!("console add {name}"));
        if sim.instances.iter().any(|i| i.name == name) {
            return Ok(err_output(1, "name already in use"));
        }
        sim.add_instance(name);
        let code = sim.add_exit_code;
        Ok(if code == 0 {
            ok_output("")
        } else {
            err_output(code, "partial")
        })
    }

    async fn launch(&self, index: u32) -> Result<Output> {
        let delay = {
            let mut sim = self.0.sim();
            sim.calls.push(format!("console launch {index}"));
            sim.launches_in_flight += 1;
            sim.max_launches_in_flight = sim.max_launches_in_flight.max(sim.launches_in_flight);
            sim.launch_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut sim = self.0.sim();
        sim.launches_in_flight -= 1;
        let boot_scans = sim.boot_scans;
        if let Some(inst) = sim.instances.iter_mut().find(|i| i.index == index) {
            if !inst.running {
                inst.running = true;
                inst.started = false;
                inst.boot_countdown = boot_scans;
            }
        }
        Ok(ok_output(""))
    }

    async fn quit(&self, name: &str) -> Result<Output> {
        let mut sim = self.0.sim();
        sim.calls.push(format!("console quit {name}"));
        if let Some(inst) = sim.find_mut(name) {
            inst.running = false;
            inst.started = false;
        }
        Ok(ok_output(""))
    }

    async fn modify(&self, name: &str, args: &[String]) -> Result<Output> {
        self.0
            .record(format!("console modify {name} {}", args.join(" ")));
        Ok(ok_output(""))
    }

    async fn copy(&self, target: &str, source: &str) -> Result<Output> {
        let mut sim = self.0.sim();
        sim.calls.push(format!("console copy {target} {source}"));
        if sim.copy_creates_target {
            sim.add_instance(target);
        }
        let code = sim.copy_exit_code;
        Ok(if code == 0 {
            ok_output("")
        } else {
            err_output(code, "copy reported an error")
        })
    }

    async fn remove(&self, name: &str) -> Result<Output> {
        let mut sim = self.0.sim();
        sim.calls.push(format!("console remove {name}"));
        sim.instances.retain(|i| i.name != name);
        Ok(ok_output(""))
    }

    async fn setprop(&self, name: &str, key: &str, value: &str) -> Result<Output> {
        self.0
            .record(format!("console setprop {name} {key}={value}"));
        Ok(ok_output(""))
    }
}

pub struct FakeBridge(pub FakeFleet);

impl DeviceBridge for FakeBridge {
    async fn connect(&self, address: &str) -> Result<Output> {
        let mut sim = self.0.sim();
        sim.calls.push(format!("bridge connect {address}"));
        let port = serial_port(address).unwrap_or(0);
        if sim.booted_on(port) {
            let already = !sim.connected.insert(address.to_string());
            let verb = if already { "already connected to" } else { "connected to" };
            Ok(ok_output(&format!("{verb} {address}\n")))
        } else {
            Ok(ok_output(&format!(
                "cannot connect to {address}: Connection refused (10061)\n"
            )))
        }
    }

    async fn disconnect(&self, address: &str) -> Result<Output> {
        let mut sim = self.0.sim();
        sim.calls.push(format!("bridge disconnect {address}"));
        if sim.connected.remove(address) {
            Ok(ok_output(&format!("disconnected {address}\n")))
        } else {
            Ok(err_output(1, &format!("error: no such device '{address}'")))
        }
    }

    async fn devices(&self) -> Result<Output> {
        let sim = self.0.sim();
        if sim.daemon_crashed {
            return Ok(err_output(1, "error: protocol fault (couldn't read status)"));
        }
        let mut out = String::from("List of devices attached\n");
        for serial in &sim.connected {
            let ready = serial_port(serial).is_some_and(|p| sim.booted_on(p));
            let state = if ready { "device" } else { "offline" };
            out.push_str(&format!("{serial}\t{state}\n"));
        }
        if sim.emulator_aliases {
            for inst in sim.instances.iter().filter(|i| i.running && i.started) {
                out.push_str(&format!("emulator-{}\tdevice\n", sim.port_of(inst) - 1));
            }
        }
        Ok(ok_output(&out))
    }

    async fn shell(&self, serial: &str, command: &str, _timeout: Duration) -> Result<Output> {
        let hang = {
            let mut sim = self.0.sim();
            sim.calls.push(format!("bridge shell {serial} {command}"));
            sim.hang_shell
        };
        if hang {
            std::future::pending::<()>().await;
        }
        let sim = self.0.sim();
        let ready = serial_port(serial).is_some_and(|p| sim.booted_on(p));
        if !ready {
            return Ok(err_output(1, &format!("error: device '{serial}' not found")));
        }
        let reply = command.strip_prefix("echo ").unwrap_or("");
        Ok(ok_output(&format!("{reply}\n")))
    }

    async fn pull(&self, serial: &str, remote: &str, local: &str, _: Duration) -> Result<Output> {
        self.0
            .record(format!("bridge pull {serial} {remote} {local}"));
        Ok(ok_output("1 file pulled\n"))
    }

    async fn push(&self, serial: &str, local: &str, remote: &str, _: Duration) -> Result<Output> {
        self.0
            .record(format!("bridge push {serial} {local} {remote}"));
        Ok(ok_output("1 file pushed\n"))
    }

    async fn install(&self, serial: &str, package: &str, _: Duration) -> Result<Output> {
        self.0.record(format!("bridge install {serial} {package}"));
        Ok(ok_output("Success\n"))
    }

    async fn kill_server(&self) -> Result<Output> {
        let mut sim = self.0.sim();
        sim.calls.push("bridge kill-server".into());
        sim.connected.clear();
        sim.daemon_crashed = false;
        Ok(ok_output(""))
    }

    async fn start_server(&self) -> Result<Output> {
        self.0.record("bridge start-server".into());
        Ok(ok_output(""))
    }
}
