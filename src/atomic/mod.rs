//! Atomic file access for atomfile.
//!
//! An [`AtomicFile`] couples an open file to an advisory lock and a
//! commit-or-cancel discipline:
//!
//! - `Read` acquisitions take a shared lock and read the target directly
//! - `Write` acquisitions take an exclusive lock and write to a staging copy,
//!   which `close()` renames over the target and `cancel()` throws away
//!
//! Concurrent readers therefore never see a partially written file, and a
//! canceled or failed write leaves the target exactly as it was (a file the
//! acquisition created is removed again).
//!
//! # Lifecycle
//!
//! Every successful acquisition ends in exactly one of `close()` or
//! `cancel()`. Both consume the handle. Dropping a handle without either
//! cancels it, logs an error, and panics in debug builds.

mod acquire;
mod commit;
mod delete;
mod inspect;
mod stream;

#[cfg(test)]
mod tests;

pub use inspect::FileStatus;
pub use stream::AtomicStream;

use crate::config::{Config, Durability};
use crate::error::Result;
use crate::flock::{AccessMode, Wait};
use crate::fs::StagingFile;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// What to do when creating a path that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// Open and lock the existing file, keeping its permissions.
    OpenIfExists,
    /// Report `Duplicate`.
    FailIfExists,
}

/// The kind of acquisition requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// The file must already exist.
    Open,
    /// Create the file if needed, with `permissions` (subject to the umask).
    Create {
        create_mode: CreateMode,
        permissions: u32,
    },
}

/// Entry point for all atomic file operations.
///
/// Cheap to clone; holds only configuration. Blocking and non-blocking
/// variants of every acquisition exist in descriptor form ([`AtomicFile`])
/// and buffered stream form ([`AtomicStream`]).
#[derive(Debug, Clone, Default)]
pub struct AtomicFileManager {
    config: Config,
}

impl AtomicFileManager {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Open an existing file, waiting for the lock.
    ///
    /// # Returns
    ///
    /// * `Ok(AtomicFile)` - Locked handle
    /// * `Err(AtomError::NotFound)` - The file does not exist
    /// * `Err(AtomError::Fault)` - Any other I/O failure
    pub fn open<P: AsRef<Path>>(&self, path: P, mode: AccessMode) -> Result<AtomicFile> {
        self.acquire(path.as_ref(), mode, Acquire::Open, Wait::Block)
    }

    /// Open an existing file without waiting.
    ///
    /// Fails with `WouldBlock` if an incompatible lock is held.
    pub fn try_open<P: AsRef<Path>>(&self, path: P, mode: AccessMode) -> Result<AtomicFile> {
        self.acquire(path.as_ref(), mode, Acquire::Open, Wait::Try)
    }

    /// Create (or, with `OpenIfExists`, open) a file, waiting for the lock.
    ///
    /// # Returns
    ///
    /// * `Ok(AtomicFile)` - Locked handle
    /// * `Err(AtomError::Duplicate)` - The file exists and `create_mode` is `FailIfExists`
    /// * `Err(AtomError::Fault)` - Any I/O failure, including a missing parent directory
    pub fn create<P: AsRef<Path>>(
        &self,
        path: P,
        mode: AccessMode,
        create_mode: CreateMode,
        permissions: u32,
    ) -> Result<AtomicFile> {
        let how = Acquire::Create {
            create_mode,
            permissions,
        };
        self.acquire(path.as_ref(), mode, how, Wait::Block)
    }

    /// Create (or open) a file without waiting.
    pub fn try_create<P: AsRef<Path>>(
        &self,
        path: P,
        mode: AccessMode,
        create_mode: CreateMode,
        permissions: u32,
    ) -> Result<AtomicFile> {
        let how = Acquire::Create {
            create_mode,
            permissions,
        };
        self.acquire(path.as_ref(), mode, how, Wait::Try)
    }

    /// Stream form of [`AtomicFileManager::open`].
    pub fn open_stream<P: AsRef<Path>>(&self, path: P, mode: AccessMode) -> Result<AtomicStream> {
        self.open(path, mode).map(|file| self.stream(file))
    }

    /// Stream form of [`AtomicFileManager::try_open`].
    pub fn try_open_stream<P: AsRef<Path>>(
        &self,
        path: P,
        mode: AccessMode,
    ) -> Result<AtomicStream> {
        self.try_open(path, mode).map(|file| self.stream(file))
    }

    /// Stream form of [`AtomicFileManager::create`].
    pub fn create_stream<P: AsRef<Path>>(
        &self,
        path: P,
        mode: AccessMode,
        create_mode: CreateMode,
        permissions: u32,
    ) -> Result<AtomicStream> {
        self.create(path, mode, create_mode, permissions)
            .map(|file| self.stream(file))
    }

    /// Stream form of [`AtomicFileManager::try_create`].
    pub fn try_create_stream<P: AsRef<Path>>(
        &self,
        path: P,
        mode: AccessMode,
        create_mode: CreateMode,
        permissions: u32,
    ) -> Result<AtomicStream> {
        self.try_create(path, mode, create_mode, permissions)
            .map(|file| self.stream(file))
    }

    /// Acquire `path` as described by `how`, blocking or not per `wait`.
    ///
    /// The named methods above are thin wrappers over this.
    pub fn acquire(
        &self,
        path: &Path,
        mode: AccessMode,
        how: Acquire,
        wait: Wait,
    ) -> Result<AtomicFile> {
        acquire::acquire(&self.config, path, mode, how, wait)
    }

    /// Stream form of [`AtomicFileManager::acquire`].
    pub fn acquire_stream(
        &self,
        path: &Path,
        mode: AccessMode,
        how: Acquire,
        wait: Wait,
    ) -> Result<AtomicStream> {
        self.acquire(path, mode, how, wait)
            .map(|file| self.stream(file))
    }

    fn stream(&self, file: AtomicFile) -> AtomicStream {
        AtomicStream::new(file, self.config.stream_buffer_size)
    }
}

/// Settings captured at acquisition time and applied at commit.
#[derive(Debug, Clone, Copy)]
struct CommitSettings {
    durability: Durability,
    sync_parent_dir: bool,
}

impl CommitSettings {
    fn from_config(config: &Config) -> Self {
        Self {
            durability: config.durability,
            sync_parent_dir: config.sync_parent_dir,
        }
    }
}

/// Resources owned while the lock is held.
#[derive(Debug)]
struct Held {
    /// Handle on the target inode; it carries the advisory lock.
    target: File,
    /// Where writes go; present for `Write` acquisitions only.
    staging: Option<StagingFile>,
    /// Whether this acquisition created the target.
    created: bool,
}

impl Held {
    fn working(&mut self) -> &mut File {
        match self.staging.as_mut() {
            Some(staging) => staging.file_mut(),
            None => &mut self.target,
        }
    }
}

/// A locked file handle.
///
/// Implements `Read`, `Write` and `Seek`. For `Write` handles these operate
/// on the staging copy, which starts out holding the target's current content
/// at offset 0. `Read` handles reject writes.
#[derive(Debug)]
pub struct AtomicFile {
    path: PathBuf,
    mode: AccessMode,
    held: Option<Held>,
    settings: CommitSettings,
}

impl AtomicFile {
    /// The target path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Whether this acquisition created the target file.
    pub fn is_created(&self) -> bool {
        self.held.as_ref().is_some_and(|held| held.created)
    }

    /// Truncate or extend the pending content.
    pub fn set_len(&mut self, size: u64) -> io::Result<()> {
        self.writable()?.set_len(size)
    }

    fn working(&mut self) -> io::Result<&mut File> {
        self.held
            .as_mut()
            .map(Held::working)
            .ok_or_else(|| io::Error::other("atomic file already finalized"))
    }

    fn writable(&mut self) -> io::Result<&mut File> {
        if self.mode == AccessMode::Read {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("'{}' was opened for reading", self.path.display()),
            ));
        }
        self.working()
    }
}

impl Read for AtomicFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.working()?.read(buf)
    }
}

impl Write for AtomicFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writable()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.working()?.flush()
    }
}

impl Seek for AtomicFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.working()?.seek(pos)
    }
}
