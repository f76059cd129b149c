//! Lock acquisition: open or create the target, lock it, and make sure the
//! lock landed on the file the path currently names.

use super::{Acquire, AtomicFile, CommitSettings, CreateMode, Held};
use crate::config::Config;
use crate::error::{AtomError, Result};
use crate::flock::{self, AccessMode, Locked, Wait};
use crate::fs::{Placeholder, StagingFile, sweep_stale};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// Non-blocking acquisitions give up after this many replaced-inode retries.
pub(super) const MAX_TRY_ATTEMPTS: u32 = 8;

/// An opened (not yet locked) target.
struct Candidate {
    file: File,
    created: bool,
}

pub(super) fn acquire(
    config: &Config,
    path: &Path,
    mode: AccessMode,
    how: Acquire,
    wait: Wait,
) -> Result<AtomicFile> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        if wait == Wait::Try && attempts > MAX_TRY_ATTEMPTS {
            return Err(AtomError::WouldBlock(path.to_path_buf()));
        }

        let candidate = match how {
            Acquire::Open => Candidate {
                file: open_existing(path)?,
                created: false,
            },
            Acquire::Create { permissions, .. } => match open_existing(path) {
                Ok(file) => Candidate {
                    file,
                    created: false,
                },
                Err(AtomError::NotFound(_)) => {
                    match create_locked(config, path, mode, permissions)? {
                        // Locked before it became visible, so it is current.
                        Some(file) => {
                            let candidate = Candidate {
                                file,
                                created: true,
                            };
                            return finish(config, path, mode, candidate);
                        }
                        // Someone else created it in the meantime.
                        None => continue,
                    }
                }
                Err(e) => return Err(e),
            },
        };

        let locked = flock::lock(&candidate.file, mode.lock_kind(), wait)
            .map_err(|e| AtomError::fault("lock", path, e))?;
        if locked == Locked::Contended {
            tracing::debug!(path = %path.display(), mode = mode.as_str(), "lock contended");
            return Err(AtomError::WouldBlock(path.to_path_buf()));
        }

        let current = flock::is_current(&candidate.file, path)
            .map_err(|e| AtomError::fault("lock", path, e))?;
        if !current {
            // Dropping the candidate releases the lock on the stale inode.
            tracing::debug!(path = %path.display(), "locked inode was replaced, retrying");
            continue;
        }

        if matches!(
            how,
            Acquire::Create {
                create_mode: CreateMode::FailIfExists,
                ..
            }
        ) {
            return Err(AtomError::Duplicate(path.to_path_buf()));
        }

        return finish(config, path, mode, candidate);
    }
}

/// Turn a locked, current candidate into a handle. Undoes the creation of
/// the target if anything fails from here on.
fn finish(
    config: &Config,
    path: &Path,
    mode: AccessMode,
    candidate: Candidate,
) -> Result<AtomicFile> {
    let staging = match mode {
        AccessMode::Read => None,
        AccessMode::Write => match prepare_staging(config, path, &candidate) {
            Ok(staging) => Some(staging),
            Err(e) => {
                if candidate.created {
                    super::commit::remove_created(path);
                }
                return Err(e);
            }
        },
    };

    tracing::debug!(
        path = %path.display(),
        mode = mode.as_str(),
        created = candidate.created,
        "acquired"
    );

    Ok(AtomicFile {
        path: path.to_path_buf(),
        mode,
        held: Some(Held {
            target: candidate.file,
            staging,
            created: candidate.created,
        }),
        settings: CommitSettings::from_config(config),
    })
}

fn prepare_staging(config: &Config, path: &Path, candidate: &Candidate) -> Result<StagingFile> {
    // Holding the exclusive lock: any staging file still around is orphaned.
    match sweep_stale(path, &config.staging_marker) {
        Ok(0) => {}
        Ok(n) => tracing::info!(path = %path.display(), removed = n, "removed stale staging files"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "staging sweep failed"),
    }

    let mut staging = StagingFile::create(path, &config.staging_marker)?;
    if !candidate.created {
        staging.fill_from(&candidate.file)?;
    }
    Ok(staging)
}

/// Open an existing target for locking.
///
/// A missing file is `NotFound` only when its directory exists; a missing
/// directory is a `Fault`.
pub(super) fn open_existing(path: &Path) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .open(path)
        .map_err(|e| classify_open_error(path, e))?;

    let is_dir = file
        .metadata()
        .map_err(|e| AtomError::fault("open", path, e))?
        .is_dir();
    if is_dir {
        return Err(AtomError::fault(
            "open",
            path,
            io::Error::from(io::ErrorKind::IsADirectory),
        ));
    }
    Ok(file)
}

fn classify_open_error(path: &Path, err: io::Error) -> AtomError {
    if err.kind() == io::ErrorKind::NotFound && parent_is_dir(path) {
        AtomError::NotFound(path.to_path_buf())
    } else {
        AtomError::fault("open", path, err)
    }
}

fn parent_is_dir(path: &Path) -> bool {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.is_dir(),
        // Relative name in the current directory.
        Some(_) => true,
        None => false,
    }
}

/// Create `path` and hold `mode`'s lock on it, with no window in which the
/// file is visible unlocked.
///
/// Returns `Ok(None)` if `path` already exists.
fn create_locked(
    config: &Config,
    path: &Path,
    mode: AccessMode,
    permissions: u32,
) -> Result<Option<File>> {
    let placeholder = Placeholder::create(path, &config.staging_marker, permissions)?;

    // Nobody else can reach the placeholder yet, so this never contends.
    match flock::lock(placeholder.file(), mode.lock_kind(), Wait::Try) {
        Ok(Locked::Granted) => {}
        Ok(Locked::Contended) => {
            placeholder.discard();
            return Err(AtomError::fault(
                "lock",
                path,
                io::Error::from(io::ErrorKind::WouldBlock),
            ));
        }
        Err(e) => {
            placeholder.discard();
            return Err(AtomError::fault("lock", path, e));
        }
    }

    placeholder
        .publish(path)
        .map_err(|e| AtomError::fault("create", path, e))
}
