//! Host command execution for os-net-config.
//!
//! Every interaction with host tools (`ethtool`, `driverctl`, `vppctl`,
//! `systemctl`, `modprobe`) goes through the [`CommandRunner`] trait so the
//! core can be exercised against scripted output in tests.
//!
//! # Example
//!
//! ```ignore
//! use osnet_common::shell::{CommandRunner, HostRunner, ETHTOOL_CMD};
//!
//! let runner = HostRunner;
//! let result = runner.exec(ETHTOOL_CMD, &["-i", "eth1"])?;
//! if result.success() {
//!     println!("{}", result.stdout);
//! }
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, Stdio};

use crate::error::{CommonError, CommonResult};

/// `ethtool` reads driver information (bus address) for kernel devices.
pub const ETHTOOL_CMD: &str = "ethtool";

/// `driverctl` persistently overrides the driver bound to a PCI device.
pub const DRIVERCTL_CMD: &str = "driverctl";

/// `modprobe` loads kernel modules such as `vfio-pci`.
pub const MODPROBE_CMD: &str = "modprobe";

/// `vppctl` talks to the running VPP process.
pub const VPPCTL_CMD: &str = "vppctl";

/// `systemctl` manages the VPP service.
pub const SYSTEMCTL_CMD: &str = "systemctl";

/// Exit code reported for a process killed by SIGPIPE.
pub const SIGPIPE_EXIT_CODE: i32 = -13;

/// Characters that force an argument to be quoted in a logged command line.
static NEEDS_QUOTING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\s$`"\\'|&;<>(){}*?]"#).expect("Invalid regex pattern"));

/// Characters that need escaping inside shell double-quotes.
static SHELL_ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([$`"\\\n])"#).expect("Invalid regex pattern"));

/// Quotes a string for safe use in a shell command line.
///
/// Wraps the string in double quotes and escapes `$`, `` ` ``, `"`, `\`
/// and newline.
///
/// # Example
///
/// ```
/// use osnet_common::shell::shellquote;
///
/// assert_eq!(shellquote("simple"), "\"simple\"");
/// assert_eq!(shellquote("with$var"), "\"with\\$var\"");
/// ```
pub fn shellquote(s: &str) -> String {
    let escaped = SHELL_ESCAPE_RE.replace_all(s, r"\$1");
    format!("\"{}\"", escaped)
}

/// Renders a program and its arguments as a single printable command line.
///
/// Arguments are quoted only when they contain shell metacharacters or
/// whitespace, so the usual case reads exactly like the typed command.
pub fn command_line(program: &str, args: &[&str]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        if arg.is_empty() || NEEDS_QUOTING_RE.is_match(arg) {
            line.push_str(&shellquote(arg));
        } else {
            line.push_str(arg);
        }
    }
    line
}

/// Result of a command execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// The exit code (0 = success, negative = killed by that signal).
    pub exit_code: i32,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

impl ExecResult {
    /// Builds a successful result carrying `stdout`.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Builds a failed result.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Returns true if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns true if the command was terminated by SIGPIPE.
    ///
    /// `vppctl` closes its pipe early on large listings, so callers reading
    /// its output accept this as a successful run.
    pub fn terminated_by_sigpipe(&self) -> bool {
        self.exit_code == SIGPIPE_EXIT_CODE
    }

    /// Returns the combined output (stdout + stderr) for error messages.
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Runs host commands.
///
/// Implementations must not retry; transient failures are reported to the
/// caller.
pub trait CommandRunner {
    /// Executes `program` with `args` and captures its output.
    ///
    /// Returns `Err` only when the process could not be spawned; a non-zero
    /// exit is reported through [`ExecResult::exit_code`].
    fn exec(&self, program: &str, args: &[&str]) -> CommonResult<ExecResult>;

    /// Executes a command and converts a non-zero exit into an error.
    fn exec_or_throw(&self, program: &str, args: &[&str]) -> CommonResult<String> {
        let result = self.exec(program, args)?;
        if result.success() {
            Ok(result.stdout)
        } else {
            Err(CommonError::ShellCommandFailed {
                command: command_line(program, args),
                exit_code: result.exit_code,
                output: result.combined_output(),
            })
        }
    }
}

/// [`CommandRunner`] that spawns real processes on the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostRunner;

impl CommandRunner for HostRunner {
    fn exec(&self, program: &str, args: &[&str]) -> CommonResult<ExecResult> {
        let line = command_line(program, args);
        tracing::debug!(command = %line, "Executing command");

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| CommonError::ShellExec {
                command: line.clone(),
                source: e,
            })?;

        let exit_code = output
            .status
            .code()
            .unwrap_or_else(|| output.status.signal().map_or(-1, |sig| -sig));
        let result = ExecResult {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        };

        if result.success() {
            tracing::trace!(command = %line, "Command succeeded");
        } else {
            tracing::warn!(
                command = %line,
                exit_code = exit_code,
                stderr = %result.stderr,
                "Command failed"
            );
        }

        Ok(result)
    }
}
