//! Test infrastructure for os-net-config
//!
//! Provides:
//! - A scripted [`CommandRunner`](osnet_common::CommandRunner) that captures
//!   every command instead of running it
//! - A throwaway `/sys/class/net` tree
//! - Fixtures for tool output, VPP configuration and topology documents

pub mod fixtures;
mod runner;
mod sysfs;

pub use fixtures::*;
pub use runner::MockRunner;
pub use sysfs::{FakeNic, FakeSysfs};
