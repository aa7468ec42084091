//! Helpers for the small state files os-net-config owns.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::Path;

use crate::error::{CommonError, CommonResult};

/// Reads a file, treating a missing file as empty.
pub fn read_or_empty(path: &Path) -> CommonResult<String> {
    match fs::read_to_string(path) {
        Ok(data) => Ok(data),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(CommonError::io(path, e)),
    }
}

/// Writes `data` to `path`, creating the parent directory when needed.
pub fn write(path: &Path, data: &str) -> CommonResult<()> {
    ensure_parent(path)?;
    fs::write(path, data).map_err(|e| CommonError::io(path, e))
}

/// Returns true when the file content differs from `data`.
///
/// A missing file differs from any non-empty `data`.
pub fn differs(path: &Path, data: &str) -> CommonResult<bool> {
    Ok(read_or_empty(path)? != data)
}

/// Creates `path` if it does not exist, leaving existing content untouched.
pub fn touch(path: &Path) -> CommonResult<()> {
    ensure_parent(path)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(|_| ())
        .map_err(|e| CommonError::io(path, e))
}

fn ensure_parent(path: &Path) -> CommonResult<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => {
            fs::create_dir_all(dir).map_err(|e| CommonError::io(dir, e))
        }
        _ => Ok(()),
    }
}
