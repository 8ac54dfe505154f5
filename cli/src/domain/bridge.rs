//! Device bridge output parsing and serial arbitration.
//!
//! The bridge can list one emulator under two serials (`127.0.0.1:5561` and
//! `emulator-5560`). Everything that counts or picks devices goes through
//! [`serial_port`] so aliases collapse onto one bridge port.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

/// Loopback host used for bridge connections unless configured otherwise.
pub const LOOPBACK_HOST: &str = "127.0.0.1";

/// Reachability of one bridge entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    /// Attached and ready for commands.
    Device,
    Offline,
    /// Listed in an unusable state (unauthorized, recovery, ...) or not listed.
    Absent,
}

impl DeviceState {
    fn parse(state: &str) -> Self {
        match state {
            "device" => Self::Device,
            "offline" => Self::Offline,
            _ => Self::Absent,
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Device => "device",
            Self::Offline => "offline",
            Self::Absent => "absent",
        })
    }
}

/// One line of `devices` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BridgeDevice {
    pub serial: String,
    pub state: DeviceState,
}

impl BridgeDevice {
    #[must_use]
    pub fn new(serial: impl Into<String>, state: DeviceState) -> Self {
        Self {
            serial: serial.into(),
            state,
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == DeviceState::Device
    }

    /// Bridge port this entry refers to, if it names one.
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        serial_port(&self.serial)
    }
}

/// Parse `devices` / `devices -l` output.
#[must_use]
pub fn parse_devices(output: &str) -> Vec<BridgeDevice> {
    let mut devices = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("List of devices attached") || line.starts_with('*')
        {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(serial), Some(state)) = (parts.next(), parts.next()) else {
            continue;
        };
        devices.push(BridgeDevice::new(serial, DeviceState::parse(state)));
    }
    devices
}

/// Canonical `host:port` serial for a bridge port.
#[must_use]
pub fn canonical_serial(host: &str, port: u16) -> String {
    format!("{host}:{port}")
}

/// Bridge port named by a serial.
///
/// `emulator-<console>` serials carry the console port, which sits one below
/// the bridge port when even. Serials without a port (USB) return `None`.
#[must_use]
pub fn serial_port(serial: &str) -> Option<u16> {
    let serial = serial.trim();
    if let Some(console) = serial.strip_prefix("emulator-") {
        let console: u16 = console.parse().ok()?;
        return if console % 2 == 0 {
            console.checked_add(1)
        } else {
            Some(console)
        };
    }
    let (host, port) = serial.rsplit_once(':')?;
    if !is_loopback(host) {
        return None;
    }
    port.parse().ok()
}

fn is_loopback(host: &str) -> bool {
    matches!(
        host.to_ascii_lowercase().as_str(),
        "127.0.0.1" | "localhost" | "0.0.0.0" | "[::1]" | "[::]"
    )
}

/// How a serial was chosen for a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialMatch {
    /// `host:port` in `device` state.
    Canonical,
    /// `emulator-<console>` alias in `device` state.
    Emulator,
    /// Another loopback spelling of the same port.
    PortMatch,
    /// Nothing matched the port; first ready device taken.
    Fallback,
}

/// Result of [`select_serial`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialChoice {
    pub serial: String,
    pub matched: SerialMatch,
}

/// Pick the serial to address a device on `port`.
///
/// Priority, in order: the canonical `host:port` form; the `emulator-` alias;
/// any other serial on the same port; the first ready device. Only entries
/// in `device` state are eligible.
#[must_use]
pub fn select_serial(port: u16, host: &str, devices: &[BridgeDevice]) -> Option<SerialChoice> {
    let ready = || devices.iter().filter(|d| d.is_ready());
    let canonical = canonical_serial(host, port);
    let loopback = canonical_serial(LOOPBACK_HOST, port);

    let pick = |serial: &str, matched| {
        Some(SerialChoice {
            serial: serial.to_string(),
            matched,
        })
    };

    if let Some(d) = ready().find(|d| d.serial == canonical || d.serial == loopback) {
        return pick(&d.serial, SerialMatch::Canonical);
    }
    if let Some(d) = ready().find(|d| d.serial.starts_with("emulator-") && d.port() == Some(port)) {
        return pick(&d.serial, SerialMatch::Emulator);
    }
    if let Some(d) = ready().find(|d| d.port() == Some(port)) {
        return pick(&d.serial, SerialMatch::PortMatch);
    }
    ready()
        .next()
        .and_then(|d| pick(&d.serial, SerialMatch::Fallback))
}

/// Distinct bridge ports with at least one ready entry.
#[must_use]
pub fn live_ports(devices: &[BridgeDevice]) -> BTreeSet<u16> {
    devices
        .iter()
        .filter(|d| d.is_ready())
        .filter_map(BridgeDevice::port)
        .collect()
}

/// Serials on `port` that are listed but not ready (stale entries).
#[must_use]
pub fn stale_serials(port: u16, devices: &[BridgeDevice]) -> Vec<String> {
    devices
        .iter()
        .filter(|d| !d.is_ready() && d.port() == Some(port))
        .map(|d| d.serial.clone())
        .collect()
}

/// Classification of `connect` output. The tool exits zero on most failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected,
    AlreadyConnected,
    Failed(String),
}

/// Classify the text printed by `connect host:port`.
#[must_use]
pub fn parse_connect_output(output: &str) -> ConnectOutcome {
    let text = output.trim();
    let lower = text.to_ascii_lowercase();
    if lower.contains("already connected") {
        ConnectOutcome::AlreadyConnected
    } else if lower.contains("connected to") && !lower.contains("cannot") {
        ConnectOutcome::Connected
    } else if text.is_empty() {
        ConnectOutcome::Failed("connect: no output".to_string())
    } else {
        ConnectOutcome::Failed(text.to_string())
    }
}
