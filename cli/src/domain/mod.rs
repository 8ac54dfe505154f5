//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod batch;
pub mod bridge;
pub mod config;
pub mod console;
pub mod error;
pub mod instance;
pub mod port;
pub mod retry;

pub use batch::{BatchEntry, BatchOutcome, BatchResult};
pub use bridge::{BridgeDevice, DeviceState};
pub use config::FleetConfig;
pub use self::console::ConsoleEntry;
pub use error::{ConfigError, FleetError};
pub use instance::{Instance, InstanceConfig, InstanceStatus, LifecyclePhase};
pub use port::{PortResolution, PortResolver};
pub use retry::RetryPolicy;
