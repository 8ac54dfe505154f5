//! Infrastructure layer: concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: process execution, the
//! console and bridge adapters, config persistence, tool lookup and logging.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod bridge;
pub mod command_runner;
pub mod config;
pub mod console;
pub mod logging;
pub mod tools;

pub use bridge::AdbBridge;
pub use command_runner::TokioCommandRunner;
pub use config::YamlConfigStore;
pub use self::console::ConsoleCli;
pub use tools::ToolPaths;
