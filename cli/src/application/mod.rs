//! Application layer: port trait definitions and fleet orchestration.
//!
//! This module depends only on `crate::domain`, never on `crate::infra`,
//! `crate::commands`, or `crate::output`.

pub mod batch;
pub mod lifecycle;
pub mod pool;
pub mod ports;
pub mod registry;
pub mod retry;

#[cfg(test)]
pub(crate) mod test_support;

pub use batch::{BatchOrchestrator, LaunchAllOptions, StopAllOptions};
pub use lifecycle::{
    CloneOutcome, LaunchOptions, LifecycleController, LifecycleSettings, RestartOptions,
    StopOptions,
};
pub use pool::{BridgeConnectionPool, DeviceAddress, ExecOptions, PoolSettings, PoolStats};
pub use ports::{
    CommandRunner, ConfigStore, DeviceBridge, InstanceConsole, ProgressReporter, SilentReporter,
};
pub use registry::InstanceRegistry;
