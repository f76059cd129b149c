//! Placeholders for files that do not exist yet.
//!
//! A new target only becomes visible already locked. The file is created
//! under a private sibling name
//! (`.<name><marker>new-<pid>-<n>`), locked there, and only then linked to
//! the target name. `link(2)` refuses to replace an existing entry, which
//! makes the publish step an atomic create-if-absent.

use super::staging::create_unique;
use crate::error::Result;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

const PLACEHOLDER_TAG: &str = "new-";

/// A new, still private file destined for a target path.
#[derive(Debug)]
pub struct Placeholder {
    path: PathBuf,
    file: File,
}

impl Placeholder {
    /// Create an empty placeholder for `target` with `permissions`
    /// (subject to the umask).
    pub fn create(target: &Path, marker: &str, permissions: u32) -> Result<Self> {
        let (path, file) = create_unique(target, marker, PLACEHOLDER_TAG, permissions)?;
        Ok(Self { path, file })
    }

    /// The open placeholder. Locks taken on it survive publishing.
    pub fn file(&self) -> &File {
        &self.file
    }

    /// Make the placeholder visible as `target`.
    ///
    /// Returns `Ok(None)` if `target` already exists. The private name is
    /// removed in every case.
    pub fn publish(self, target: &Path) -> io::Result<Option<File>> {
        let linked = fs::hard_link(&self.path, target);
        remove_private_name(&self.path);
        match linked {
            Ok(()) => Ok(Some(self.file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Throw the placeholder away unpublished.
    pub fn discard(self) {
        remove_private_name(&self.path);
    }
}

fn remove_private_name(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        tracing::warn!(placeholder = %path.display(), error = %e, "failed to remove placeholder");
    }
}
