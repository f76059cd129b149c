//! atomfile: advisory-locked atomic file access.
//!
//! Files are acquired for reading or writing through an
//! [`AtomicFileManager`]. Readers share a lock; a writer holds it alone and
//! works on a staging copy that replaces the target in one rename when the
//! handle is closed, or vanishes when it is canceled.
//!
//! ```no_run
//! use atomfile::{AccessMode, AtomicFileManager, CreateMode};
//! use std::io::Write;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let files = AtomicFileManager::default();
//! let mut file = files.create("state.json", AccessMode::Write, CreateMode::OpenIfExists, 0o644)?;
//! file.set_len(0)?;
//! file.write_all(b"{}")?;
//! file.close()?;
//! # Ok(())
//! # }
//! ```

pub mod atomic;
pub mod config;
pub mod error;
pub mod exit_codes;
pub mod flock;
pub mod fs;
pub mod logging;

pub use atomic::{Acquire, AtomicFile, AtomicFileManager, AtomicStream, CreateMode, FileStatus};
pub use config::{Config, Durability};
pub use error::{AtomError, Result};
pub use flock::{AccessMode, LockState, Wait};
