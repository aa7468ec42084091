//! Error types shared by the os-net-config crates.
//!
//! These cover the plumbing underneath the core: running host tools and
//! reading or writing state files. All errors implement `std::error::Error`
//! via `thiserror`.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for common operations.
pub type CommonResult<T> = Result<T, CommonError>;

/// Errors raised by host command execution and file handling.
#[derive(Debug, Error)]
pub enum CommonError {
    /// Failed to spawn a host command.
    #[error("Failed to execute command '{command}': {source}")]
    ShellExec {
        /// The command line that failed to execute.
        command: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Host command returned a non-zero exit code.
    #[error("Command failed: '{command}' (exit code {exit_code}): {output}")]
    ShellCommandFailed {
        /// The command line that failed.
        command: String,
        /// The exit code.
        exit_code: i32,
        /// Combined stdout/stderr output.
        output: String,
    },

    /// Reading or writing a file failed.
    #[error("IO error on '{}': {source}", path.display())]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// A YAML document could not be parsed or serialized.
    #[error("Invalid YAML in '{}': {source}", path.display())]
    Yaml {
        /// The file involved.
        path: PathBuf,
        /// The underlying serde_yaml error.
        #[source]
        source: serde_yaml::Error,
    },
}

impl CommonError {
    /// Creates an IO error bound to a path.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Creates a YAML error bound to a path.
    pub fn yaml(path: impl AsRef<Path>, source: serde_yaml::Error) -> Self {
        Self::Yaml {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}
