//! Unit tests for the emufleet library
//!
//! These tests use scripted console/bridge fakes and run fast without
//! spawning the external tools.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod architecture;
mod config_store;
mod helpers;
mod pool_exec;
mod property_tests;
mod registry_refresh;
