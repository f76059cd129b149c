//! Staging files for atomic commits.
//!
//! Writes made through a write-locked handle never touch the target. They go
//! to a staging file in the same directory, which the commit renames over the
//! target.
//!
//! # Implementation Strategy
//!
//! 1. Create `.{filename}{marker}{pid}-{n}` next to the target (`create_new`)
//! 2. Optionally seed it with the target's current content
//! 3. On commit: sync, copy the target's permission bits, `rename()` over the
//!    target, sync the parent directory
//! 4. On discard: remove it
//!
//! # Important Notes
//!
//! - `rename()` is atomic only within one filesystem, hence the same directory
//! - A staging file is only alive while its owner holds the target's exclusive
//!   lock, so anything matching the prefix found under that lock is a leftover
//!   from a crashed writer (see [`sweep_stale`])

use crate::config::Durability;
use crate::error::{AtomError, Result};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions, Permissions};
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Attempts at finding an unused staging name before giving up.
const MAX_NAME_ATTEMPTS: u32 = 16;

/// A staging file bound to a target path.
///
/// Unless [`StagingFile::commit`] succeeds, dropping it removes the file.
#[derive(Debug)]
pub struct StagingFile {
    path: PathBuf,
    file: File,
    armed: bool,
}

impl StagingFile {
    /// Create a fresh, empty staging file for `target`.
    pub fn create(target: &Path, marker: &str) -> Result<Self> {
        let (path, file) = create_unique(target, marker, "", 0o600)?;
        tracing::debug!(staging = %path.display(), "created staging file");
        Ok(Self {
            path,
            file,
            armed: true,
        })
    }

    /// Path of the staging file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }

    /// Copy the whole of `source` into the staging file and rewind it.
    pub fn fill_from(&mut self, source: &File) -> Result<()> {
        copy_and_rewind(source, &mut self.file)
            .map_err(|e| AtomError::fault("copy current content into", &self.path, e))
    }

    /// Atomically replace `target` with the staged content.
    ///
    /// `permissions` are applied to the staging file before the rename so the
    /// committed file keeps the target's mode bits. On any failure the staging
    /// file is removed and `target` is left untouched.
    pub fn commit(
        mut self,
        target: &Path,
        permissions: Option<Permissions>,
        durability: Durability,
        sync_parent_dir: bool,
    ) -> Result<()> {
        sync_file(&self.file, durability)
            .and_then(|_| match permissions {
                Some(perms) => self.file.set_permissions(perms),
                None => Ok(()),
            })
            .map_err(|e| AtomError::fault("sync staged content for", target, e))?;

        atomic_replace(&self.path, target)?;
        self.armed = false;

        if sync_parent_dir {
            sync_dir_of(target);
        }

        Ok(())
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = fs::remove_file(&self.path)
            && e.kind() != io::ErrorKind::NotFound
        {
            tracing::warn!(
                staging = %self.path.display(),
                error = %e,
                "failed to remove staging file"
            );
        }
    }
}

/// Remove staging leftovers of `target`.
///
/// Only call this while holding the exclusive lock on the inode `target`
/// currently names. Only names of the exact form `.<name><marker><pid>-<n>`
/// are touched. Returns the number of files removed; failures to remove
/// individual entries are logged and skipped.
pub fn sweep_stale(target: &Path, marker: &str) -> Result<usize> {
    let (dir, prefix) = staging_prefix(target, marker)?;
    let read_dir_path = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir.as_path()
    };

    let entries = fs::read_dir(read_dir_path)
        .map_err(|e| AtomError::fault("scan staging directory of", target, e))?;

    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let is_staging = name
            .as_encoded_bytes()
            .strip_prefix(prefix.as_encoded_bytes())
            .is_some_and(is_unique_suffix);
        if !is_staging {
            continue;
        }
        let path = entry.path();
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(staging = %path.display(), "removed stale staging file");
                removed += 1;
            }
            Err(e) => tracing::warn!(
                staging = %path.display(),
                error = %e,
                "failed to remove stale staging file"
            ),
        }
    }

    Ok(removed)
}

/// `<pid>-<n>`, both decimal.
fn is_unique_suffix(suffix: &[u8]) -> bool {
    let is_number = |part: &[u8]| !part.is_empty() && part.iter().all(u8::is_ascii_digit);
    let mut parts = suffix.splitn(2, |b| *b == b'-');
    match (parts.next(), parts.next()) {
        (Some(pid), Some(n)) => is_number(pid) && is_number(n),
        _ => false,
    }
}

/// Create `.<name><marker><tag><pid>-<n>` next to `target` with `mode`
/// (subject to the umask), retrying on name collisions.
pub(crate) fn create_unique(
    target: &Path,
    marker: &str,
    tag: &str,
    mode: u32,
) -> Result<(PathBuf, File)> {
    let (dir, prefix) = staging_prefix(target, marker)?;

    for _ in 0..MAX_NAME_ATTEMPTS {
        let n = STAGING_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut name = prefix.clone();
        name.push(format!("{}{}-{}", tag, std::process::id(), n));
        let path = dir.join(name);

        match open_new(&path, mode) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(AtomError::fault("create staging file for", target, e)),
        }
    }

    Err(AtomError::fault(
        "create staging file for",
        target,
        io::Error::new(
            io::ErrorKind::AlreadyExists,
            "no unused staging name available",
        ),
    ))
}

/// Directory and name prefix shared by every staging file of `target`.
fn staging_prefix(target: &Path, marker: &str) -> Result<(PathBuf, OsString)> {
    let filename = target.file_name().ok_or_else(|| {
        AtomError::UserError(format!("invalid file path '{}'", target.display()))
    })?;
    let parent = target.parent().unwrap_or(Path::new("."));

    let mut prefix = OsString::from(".");
    prefix.push(filename);
    prefix.push(marker);
    Ok((parent.to_path_buf(), prefix))
}

#[cfg(unix)]
fn open_new(path: &Path, mode: u32) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .mode(mode)
        .open(path)
}

#[cfg(not(unix))]
fn open_new(path: &Path, _mode: u32) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open(path)
}

fn copy_and_rewind(source: &File, dest: &mut File) -> io::Result<()> {
    let mut reader = source;
    reader.seek(SeekFrom::Start(0))?;
    io::copy(&mut reader, dest)?;
    dest.seek(SeekFrom::Start(0))?;
    Ok(())
}

fn sync_file(file: &File, durability: Durability) -> io::Result<()> {
    match durability {
        Durability::Full => file.sync_all(),
        Durability::Data => file.sync_data(),
        Durability::None => Ok(()),
    }
}

/// Atomically replace the target file with the source file.
///
/// On POSIX, `rename()` is atomic and replaces the destination if it exists.
fn atomic_replace(source: &Path, target: &Path) -> Result<()> {
    fs::rename(source, target).map_err(|e| AtomError::fault("commit", target, e))
}

/// Persist the directory entry after a rename. Best effort.
fn sync_dir_of(target: &Path) {
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if let Ok(dir) = File::open(parent)
        && let Err(e) = dir.sync_all()
    {
        tracing::debug!(dir = %parent.display(), error = %e, "directory sync failed");
    }
}
