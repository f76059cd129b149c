//! Advisory file locking for atomfile.
//!
//! Locks are `flock(2)`-style (through `fs2`): whole-file, attached to the
//! open file description, shared or exclusive. Two handles opened separately
//! contend even inside one process, exactly as two processes would.
//!
//! # Inode Identity
//!
//! A lock protects an inode, not a name. Commits replace the inode behind a
//! path and deletes unlink it, so an acquirer that was waiting on the old
//! inode wakes up holding a lock nobody else cares about. `is_current` lets
//! the caller detect that and retry against whatever the path names now.

use fs2::FileExt;
use serde::Serialize;
use std::fs::{self, File};
use std::io;
use std::path::Path;

/// Requested access, which decides the lock kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Shared lock; other readers may hold the file concurrently.
    Read,
    /// Exclusive lock; excludes readers and writers.
    Write,
}

impl AccessMode {
    /// The lock kind this access mode requests.
    pub fn lock_kind(self) -> LockKind {
        match self {
            AccessMode::Read => LockKind::Shared,
            AccessMode::Write => LockKind::Exclusive,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::Read => "read",
            AccessMode::Write => "write",
        }
    }
}

/// Kind of advisory lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    Shared,
    Exclusive,
}

/// Whether an acquisition may suspend the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// Suspend in the lock syscall until the lock is granted.
    Block,
    /// Fail immediately with `WouldBlock` on contention.
    Try,
}

/// Observed lock state of a path, as reported by inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    Unlocked,
    Shared,
    Exclusive,
}

/// Outcome of a lock attempt.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Locked {
    Granted,
    Contended,
}

/// Place a lock of `kind` on `file`.
///
/// With `Wait::Block` this only returns once the lock is granted (or the
/// syscall fails for a reason other than an interrupt). With `Wait::Try` a
/// held incompatible lock yields `Locked::Contended`.
pub(crate) fn lock(file: &File, kind: LockKind, wait: Wait) -> io::Result<Locked> {
    match wait {
        Wait::Block => loop {
            // fs2 is called through the trait: std's inherent File locking
            // methods would otherwise shadow these names.
            let result = match kind {
                LockKind::Shared => FileExt::lock_shared(file),
                LockKind::Exclusive => FileExt::lock_exclusive(file),
            };
            match result {
                Ok(()) => return Ok(Locked::Granted),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        },
        Wait::Try => {
            let result = match kind {
                LockKind::Shared => FileExt::try_lock_shared(file),
                LockKind::Exclusive => FileExt::try_lock_exclusive(file),
            };
            match result {
                Ok(()) => Ok(Locked::Granted),
                Err(e) if is_contended(&e) => Ok(Locked::Contended),
                Err(e) => Err(e),
            }
        }
    }
}

/// Release whatever lock `file` holds.
pub(crate) fn unlock(file: &File) -> io::Result<()> {
    FileExt::unlock(file)
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Whether `path` still names the inode behind `file`.
///
/// Returns `Ok(false)` when the path was removed or now names another file.
#[cfg(unix)]
pub(crate) fn is_current(file: &File, path: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let held = file.metadata()?;
    match fs::metadata(path) {
        Ok(on_disk) => Ok(held.dev() == on_disk.dev() && held.ino() == on_disk.ino()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Non-unix fallback: without inode numbers only existence can be checked.
#[cfg(not(unix))]
pub(crate) fn is_current(_file: &File, path: &Path) -> io::Result<bool> {
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Probe the lock state of an open file without keeping any lock.
///
/// Takes and immediately releases non-blocking locks, so a concurrent
/// non-blocking acquirer may briefly see contention caused by the probe.
pub(crate) fn probe(file: &File) -> io::Result<LockState> {
    if lock(file, LockKind::Exclusive, Wait::Try)? == Locked::Granted {
        unlock(file)?;
        return Ok(LockState::Unlocked);
    }
    if lock(file, LockKind::Shared, Wait::Try)? == Locked::Granted {
        unlock(file)?;
        return Ok(LockState::Shared);
    }
    Ok(LockState::Exclusive)
}
