//! Locating the console and bridge executables.
//!
//! Environment variables win over the config file; the bridge additionally
//! falls back to `ADB_PATH` and the Android SDK before the bare default.

use std::path::{Path, PathBuf};

use crate::domain::config::ToolsConfig;

pub const CONSOLE_ENV: &str = "EMUFLEET_CONSOLE";
pub const BRIDGE_ENV: &str = "EMUFLEET_BRIDGE";

/// Resolved executable paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub console: String,
    pub bridge: String,
}

impl ToolPaths {
    /// Resolve against the process environment.
    #[must_use]
    pub fn resolve(config: &ToolsConfig) -> Self {
        Self::resolve_with(config, |key| std::env::var(key).ok(), Path::exists)
    }

    /// Resolve with injectable lookups.
    pub fn resolve_with(
        config: &ToolsConfig,
        lookup: impl Fn(&str) -> Option<String>,
        exists: impl Fn(&Path) -> bool,
    ) -> Self {
        let env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let console = env(CONSOLE_ENV).unwrap_or_else(|| config.console.clone());

        let default_bridge = ToolsConfig::default().bridge;
        let bridge = env(BRIDGE_ENV)
            .or_else(|| (config.bridge != default_bridge).then(|| config.bridge.clone()))
            .or_else(|| env("ADB_PATH"))
            .or_else(|| {
                let sdk = env("ANDROID_SDK_ROOT").or_else(|| env("ANDROID_HOME"))?;
                let adb = sdk_adb(Path::new(&sdk));
                exists(&adb).then(|| adb.display().to_string())
            })
            .unwrap_or_else(|| config.bridge.clone());

        tracing::debug!(%console, %bridge, "tool paths");
        Self { console, bridge }
    }
}

fn sdk_adb(sdk: &Path) -> PathBuf {
    let exe = if cfg!(windows) { "adb.exe" } else { "adb" };
    sdk.join("platform-tools").join(exe)
}
