//! Error types for atomfile.
//!
//! Uses thiserror for derive macros. The four acquisition outcomes callers
//! branch on (`NotFound`, `Duplicate`, `WouldBlock`, `Fault`) are distinct
//! variants so they can be matched without string inspection.

use crate::exit_codes;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for atomic file operations.
///
/// None of these are retried internally; retry policy belongs to the caller.
#[derive(Error, Debug)]
pub enum AtomError {
    /// The file does not exist (its parent directory does).
    #[error("'{}' does not exist", .0.display())]
    NotFound(PathBuf),

    /// The file already exists and the create policy forbids opening it.
    #[error("'{}' already exists", .0.display())]
    Duplicate(PathBuf),

    /// A non-blocking acquisition hit an incompatible lock.
    #[error("'{}' is locked by another holder", .0.display())]
    WouldBlock(PathBuf),

    /// Any other I/O failure: permission denied, missing directory, disk full.
    #[error("failed to {op} '{}': {source}", .path.display())]
    Fault {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Invalid arguments or configuration.
    #[error("{0}")]
    UserError(String),
}

impl AtomError {
    /// Build a `Fault` for `op` on `path`.
    pub fn fault(op: &'static str, path: &Path, source: io::Error) -> Self {
        AtomError::Fault {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            AtomError::NotFound(_) => exit_codes::NOT_FOUND,
            AtomError::Duplicate(_) => exit_codes::DUPLICATE,
            AtomError::WouldBlock(_) => exit_codes::WOULD_BLOCK,
            AtomError::Fault { .. } => exit_codes::FAULT,
            AtomError::UserError(_) => exit_codes::USER_ERROR,
        }
    }

    /// Short stable code, printed with CLI errors.
    pub fn code(&self) -> &'static str {
        match self {
            AtomError::NotFound(_) => "NOT_FOUND",
            AtomError::Duplicate(_) => "DUPLICATE",
            AtomError::WouldBlock(_) => "WOULD_BLOCK",
            AtomError::Fault { .. } => "FAULT",
            AtomError::UserError(_) => "USER_ERROR",
        }
    }
}

/// Result type alias for atomfile operations.
pub type Result<T> = std::result::Result<T, AtomError>;
