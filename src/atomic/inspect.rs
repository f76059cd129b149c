//! Lock inspection.

use super::AtomicFileManager;
use super::acquire::open_existing;
use crate::error::{AtomError, Result};
use crate::flock::{self, LockState};
use serde::Serialize;
use std::fs::Permissions;
use std::path::{Path, PathBuf};

/// Snapshot of a target, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct FileStatus {
    pub path: PathBuf,
    pub size: u64,
    /// Permission bits in octal, e.g. `"0644"`.
    pub permissions: String,
    pub lock: LockState,
}

impl AtomicFileManager {
    /// Report who, if anyone, holds a lock on `path`.
    ///
    /// The probe takes and drops non-blocking locks itself, so it can make a
    /// concurrent `try_*` call fail with `WouldBlock` for an instant.
    pub fn lock_state<P: AsRef<Path>>(&self, path: P) -> Result<LockState> {
        let path = path.as_ref();
        let file = open_existing(path)?;
        flock::probe(&file).map_err(|e| AtomError::fault("inspect lock on", path, e))
    }

    /// Size, permissions and lock state of `path`.
    pub fn status<P: AsRef<Path>>(&self, path: P) -> Result<FileStatus> {
        let path = path.as_ref();
        let file = open_existing(path)?;
        let meta = file
            .metadata()
            .map_err(|e| AtomError::fault("stat", path, e))?;
        let lock = flock::probe(&file).map_err(|e| AtomError::fault("inspect lock on", path, e))?;

        Ok(FileStatus {
            path: path.to_path_buf(),
            size: meta.len(),
            permissions: format_permissions(&meta.permissions()),
            lock,
        })
    }
}

#[cfg(unix)]
fn format_permissions(perms: &Permissions) -> String {
    use std::os::unix::fs::PermissionsExt;

    format!("{:04o}", perms.mode() & 0o7777)
}

#[cfg(not(unix))]
fn format_permissions(perms: &Permissions) -> String {
    if perms.readonly() { "0444" } else { "0644" }.to_string()
}
