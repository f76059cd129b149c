//! Locked removal of a target.

use super::AtomicFileManager;
use super::acquire::{MAX_TRY_ATTEMPTS, open_existing};
use super::commit::release;
use crate::error::{AtomError, Result};
use crate::flock::{self, LockKind, Locked, Wait};
use crate::fs::sweep_stale;
use std::fs;
use std::path::Path;

impl AtomicFileManager {
    /// Remove `path` once no one holds a lock on it.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Removed
    /// * `Err(AtomError::NotFound)` - The file does not exist
    /// * `Err(AtomError::Fault)` - Any other I/O failure
    pub fn delete<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.remove(path.as_ref(), Wait::Block)
    }

    /// Remove `path`, failing with `WouldBlock` if anyone holds a lock on it.
    pub fn try_delete<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.remove(path.as_ref(), Wait::Try)
    }

    fn remove(&self, path: &Path, wait: Wait) -> Result<()> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            if wait == Wait::Try && attempts > MAX_TRY_ATTEMPTS {
                return Err(AtomError::WouldBlock(path.to_path_buf()));
            }

            let target = open_existing(path)?;
            let locked = flock::lock(&target, LockKind::Exclusive, wait)
                .map_err(|e| AtomError::fault("lock", path, e))?;
            if locked == Locked::Contended {
                return Err(AtomError::WouldBlock(path.to_path_buf()));
            }

            let current = flock::is_current(&target, path)
                .map_err(|e| AtomError::fault("lock", path, e))?;
            if !current {
                tracing::debug!(path = %path.display(), "locked inode was replaced, retrying");
                continue;
            }

            // Only safe while `path` still names the locked inode.
            if let Err(e) = sweep_stale(path, &self.config.staging_marker) {
                tracing::warn!(path = %path.display(), error = %e, "staging sweep failed");
            }

            let removed = fs::remove_file(path).map_err(|e| AtomError::fault("delete", path, e));
            if removed.is_ok() {
                tracing::debug!(path = %path.display(), "deleted");
            }
            release(path, target);
            return removed;
        }
    }
}
