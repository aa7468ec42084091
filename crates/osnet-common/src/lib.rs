//! Common infrastructure for os-net-config.
//!
//! This crate provides the plumbing the core crate builds on:
//!
//! - [`shell`]: host command execution behind the [`CommandRunner`] trait
//! - [`error`]: error types for command and file handling
//! - [`files`]: small helpers for reading and writing state files
//!
//! # Example
//!
//! ```ignore
//! use osnet_common::{CommandRunner, HostRunner, shell::ETHTOOL_CMD};
//!
//! fn driver_info(name: &str) -> osnet_common::CommonResult<String> {
//!     HostRunner.exec_or_throw(ETHTOOL_CMD, &["-i", name])
//! }
//! ```

pub mod error;
pub mod files;
pub mod shell;

// Re-export commonly used items at crate root
pub use error::{CommonError, CommonResult};
pub use shell::{CommandRunner, ExecResult, HostRunner};
