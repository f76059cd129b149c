//! Commit and cancel: the two ways an acquisition ends.

use super::{AtomicFile, Held};
use crate::error::{AtomError, Result};
use crate::flock;
use std::fs::{self, File};
use std::io;
use std::path::Path;

impl AtomicFile {
    /// Commit pending writes and release the lock.
    ///
    /// For `Write` handles the staged content is synced and renamed over the
    /// target; readers see either the old or the new file, never a mix. For
    /// `Read` handles this only releases the lock (a file created by the
    /// acquisition is kept).
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Committed
    /// * `Err(AtomError::Fault)` - Sync or rename failed. The commit is rolled
    ///   back as by [`AtomicFile::cancel`] and the lock is still released.
    pub fn close(mut self) -> Result<()> {
        let Some(held) = self.held.take() else {
            return Ok(());
        };
        let Held {
            target,
            staging,
            created,
        } = held;

        let outcome = match staging {
            Some(staging) => target
                .metadata()
                .map_err(|e| AtomError::fault("read permissions of", &self.path, e))
                .and_then(|meta| {
                    staging.commit(
                        &self.path,
                        Some(meta.permissions()),
                        self.settings.durability,
                        self.settings.sync_parent_dir,
                    )
                }),
            None => Ok(()),
        };

        match &outcome {
            Ok(()) => tracing::debug!(path = %self.path.display(), "committed"),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "commit failed, rolled back");
                if created {
                    remove_created(&self.path);
                }
            }
        }

        release(&self.path, target);
        outcome
    }

    /// Discard pending writes and release the lock.
    ///
    /// The target is left exactly as it was before the acquisition; a target
    /// the acquisition created is removed.
    pub fn cancel(mut self) {
        if let Some(held) = self.held.take() {
            discard(&self.path, held);
            tracing::debug!(path = %self.path.display(), "canceled");
        }
    }
}

impl Drop for AtomicFile {
    fn drop(&mut self) {
        if let Some(held) = self.held.take() {
            tracing::error!(
                path = %self.path.display(),
                "atomic file dropped without close() or cancel(), canceling"
            );
            discard(&self.path, held);
            debug_assert!(
                std::thread::panicking(),
                "AtomicFile for '{}' dropped without close() or cancel()",
                self.path.display()
            );
        }
    }
}

fn discard(path: &Path, held: Held) {
    let Held {
        target,
        staging,
        created,
    } = held;
    drop(staging);
    if created {
        remove_created(path);
    }
    release(path, target);
}

/// Remove a target created by the current acquisition. Caller holds its lock.
pub(super) fn remove_created(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "failed to remove file created by canceled acquisition"
        ),
    }
}

/// Unlock and close the target handle.
pub(super) fn release(path: &Path, target: File) {
    if let Err(e) = flock::unlock(&target) {
        // Closing the descriptor below releases the lock regardless.
        tracing::debug!(path = %path.display(), error = %e, "explicit unlock failed");
    }
    drop(target);
}
