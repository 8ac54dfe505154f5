//! Human-readable terminal renderer.

use std::path::Path;

use chrono::{DateTime, Utc};
use owo_colors::OwoColorize as _;

use crate::domain::batch::{BatchOutcome, BatchResult};
use crate::domain::bridge::{BridgeDevice, DeviceState};
use crate::domain::config::FleetConfig;
use crate::domain::instance::{Instance, LifecyclePhase};
use crate::output::OutputContext;

/// Renders domain types as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Render the instance table.
    pub fn render_instances(&self, instances: &[Instance]) {
        if instances.is_empty() {
            if !self.ctx.quiet {
                println!("No instances. Create one: emufleet create <name>");
            }
            return;
        }
        println!(
            "  {}",
            format!("{:>5}  {:<24} {:<11} {:>6}  {:>7}  {}", "INDEX", "NAME", "PHASE", "PORT", "PID", "UPDATED")
                .style(self.ctx.styles.header)
        );
        let now = Utc::now();
        for inst in instances {
            let phase = format!("{:<11}", inst.phase.to_string());
            let pid = inst.pid.map_or_else(|| "-".to_string(), |p| p.to_string());
            println!(
                "  {:>5}  {:<24} {} {:>6}  {:>7}  {}",
                inst.index,
                inst.name,
                phase.style(self.phase_style(inst.phase)),
                inst.port,
                pid,
                format_age(inst.updated_at, now).style(self.ctx.styles.dim),
            );
        }
    }

    fn phase_style(&self, phase: LifecyclePhase) -> owo_colors::Style {
        match phase {
            LifecyclePhase::Running => self.ctx.styles.running,
            LifecyclePhase::Stopped => self.ctx.styles.dim,
            LifecyclePhase::Failed => self.ctx.styles.error,
            _ => self.ctx.styles.transitional,
        }
    }

    pub fn render_instance(&self, action: &str, instance: &Instance) {
        self.ctx.success(&format!(
            "{action} {} (index {}, port {}, {})",
            instance.name, instance.index, instance.port, instance.phase
        ));
    }

    pub fn render_done(&self, action: &str, name: &str) {
        self.ctx.success(&format!("{action} {name}"));
    }

    pub fn render_clone(&self, source: &str, target: &Instance, relaunched: bool) {
        self.ctx.success(&format!(
            "Cloned {source} → {} (index {}, port {})",
            target.name, target.index, target.port
        ));
        if relaunched {
            self.ctx.info(&format!("{source} relaunched"));
        }
    }

    pub fn render_port(&self, _name: &str, port: u16) {
        println!("{port}");
    }

    /// Raw command output is printed verbatim, even in quiet mode.
    pub fn render_exec(&self, _target: &str, output: &str) {
        print!("{output}");
        if !output.is_empty() && !output.ends_with('\n') {
            println!();
        }
    }

    /// Render per-instance outcomes followed by the totals line.
    pub fn render_batch(&self, action: &str, result: &BatchResult) {
        if !self.ctx.quiet {
            println!();
            for entry in result.entries() {
                match &entry.outcome {
                    BatchOutcome::Success => println!(
                        "  {} {:<24} {action}",
                        "✓".style(self.ctx.styles.success),
                        entry.instance_name
                    ),
                    BatchOutcome::Failed(err) => println!(
                        "  {} {:<24} {}",
                        "✗".style(self.ctx.styles.error),
                        entry.instance_name,
                        err
                    ),
                    BatchOutcome::Skipped(reason) => println!(
                        "  {} {:<24} {}",
                        "-".style(self.ctx.styles.dim),
                        entry.instance_name,
                        reason.style(self.ctx.styles.dim)
                    ),
                }
            }
            println!();
        }
        let summary = format_batch_summary(result);
        if result.all_succeeded() {
            self.ctx.success(&summary);
        } else {
            self.ctx.error(&summary);
        }
    }

    pub fn render_devices(&self, devices: &[BridgeDevice]) {
        if devices.is_empty() {
            if !self.ctx.quiet {
                println!("No bridge devices attached.");
            }
            return;
        }
        for device in devices {
            let state = device.state.to_string();
            let styled = match device.state {
                DeviceState::Device => state.style(self.ctx.styles.running).to_string(),
                DeviceState::Offline => state.style(self.ctx.styles.warning).to_string(),
                DeviceState::Absent => state.style(self.ctx.styles.dim).to_string(),
            };
            let port = device
                .port()
                .map_or_else(|| "-".to_string(), |p| p.to_string());
            println!("  {:<24} {:<8} port {port}", device.serial, styled);
        }
    }

    /// Render the current configuration.
    pub fn render_config(&self, config: &FleetConfig, path: &Path) {
        println!();
        println!(
            "  {}",
            format!("Configuration ({})", path.display()).style(self.ctx.styles.header)
        );
        println!();
        for (key, value) in config_rows(config) {
            println!("  {:<26} {value}", format!("{key}:"));
        }
        println!();
        println!("  {}", "Environment:".style(self.ctx.styles.bold));
        for var in ["EMUFLEET_CONFIG", "EMUFLEET_CONSOLE", "EMUFLEET_BRIDGE", "ADB_PATH", "NO_COLOR"] {
            println!(
                "    {:<18} {}",
                format!("{var}:"),
                std::env::var(var).unwrap_or_else(|_| "(not set)".to_string())
            );
        }
        println!();
    }

    pub fn render_config_path(&self, path: &Path) {
        println!("{}", path.display());
    }

    pub fn render_config_set(&self, key: &str, value: &str) {
        self.ctx.success(&format!("Set {key} = {value}"));
    }

    /// Render the CLI version information.
    pub fn render_version(&self, version: &str) {
        println!("emufleet {version}");
    }
}

// ── Display helpers (used by tests and output layer) ─────────────────────────

/// Flatten the config into `key = value` rows in settings-key order.
#[must_use]
pub fn config_rows(config: &FleetConfig) -> Vec<(&'static str, String)> {
    let t = &config.timeouts;
    let r = &config.retry;
    vec![
        ("tools.console", config.tools.console.clone()),
        ("tools.bridge", config.tools.bridge.clone()),
        ("bridge.host", config.bridge.host.clone()),
        ("bridge.base_port", config.bridge.base_port.to_string()),
        ("timeouts.console", format!("{}s", t.console)),
        ("timeouts.shell", format!("{}s", t.shell)),
        ("timeouts.interactive", format!("{}s", t.interactive)),
        ("timeouts.transfer", format!("{}s", t.transfer)),
        ("timeouts.boot", format!("{}s", t.boot)),
        ("timeouts.launch", format!("{}s", t.launch)),
        ("timeouts.stop", format!("{}s", t.stop)),
        ("timeouts.restart_settle", format!("{}s", t.restart_settle)),
        ("retry.launch_attempts", r.launch_attempts.to_string()),
        ("retry.launch_backoff", format!("{}s", r.launch_backoff)),
        ("retry.connect_attempts", r.connect_attempts.to_string()),
        ("retry.connect_backoff", format!("{}s", r.connect_backoff)),
        ("batch.max_concurrent", config.batch.max_concurrent.to_string()),
        ("batch.delay", format!("{}s", config.batch.delay)),
    ]
}

#[must_use]
pub fn format_batch_summary(result: &BatchResult) -> String {
    format!(
        "{} succeeded, {} failed, {} skipped",
        result.success_count(),
        result.fail_count(),
        result.skipped_count()
    )
}

/// Compact age such as `12s`, `4m`, `2h 5m`.
#[must_use]
pub fn format_age(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - at).num_seconds().max(0);
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m")
    } else {
        format!("{secs}s")
    }
}
