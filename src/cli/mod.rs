//! CLI argument parsing for atomfile.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use atomfile::{AccessMode, CreateMode, Wait};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// atomfile: read, write and delete files under advisory locks.
///
/// Writes go to a staging copy that replaces the target in a single rename,
/// so concurrent readers see either the old or the new content.
#[derive(Parser, Debug)]
#[command(name = "atomfile")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// YAML config file (defaults to $ATOMFILE_CONFIG, then built-in defaults).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Process umask to apply before creating files, in octal.
    #[arg(long, global = true, value_name = "OCTAL")]
    pub umask: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for atomfile.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replace a file's content with stdin.
    ///
    /// The new content becomes visible in one step when stdin is exhausted.
    Write(WriteArgs),

    /// Copy a file to stdout under a shared lock.
    Read(ReadArgs),

    /// Delete a file once no one holds a lock on it.
    Delete(DeleteArgs),

    /// Acquire a file and keep it locked until stdin yields a line or EOF.
    ///
    /// Prints `locked` once the lock is held.
    Hold(HoldArgs),

    /// Show size, permissions and lock state of a file as JSON.
    Status(StatusArgs),
}

/// What to do when the target does not exist (or does).
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatePolicy {
    /// Create if missing, otherwise open.
    Open,
    /// Create; fail if the file exists.
    Fail,
}

impl From<CreatePolicy> for CreateMode {
    fn from(policy: CreatePolicy) -> Self {
        match policy {
            CreatePolicy::Open => CreateMode::OpenIfExists,
            CreatePolicy::Fail => CreateMode::FailIfExists,
        }
    }
}

/// Lock mode for `hold`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    Read,
    Write,
}

impl From<ModeArg> for AccessMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Read => AccessMode::Read,
            ModeArg::Write => AccessMode::Write,
        }
    }
}

/// Flags shared by every locking command.
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct WaitArgs {
    /// Fail with exit code 4 instead of waiting for the lock.
    #[arg(long = "try")]
    pub try_lock: bool,
}

impl WaitArgs {
    pub fn wait(self) -> Wait {
        if self.try_lock { Wait::Try } else { Wait::Block }
    }
}

/// Arguments for the `write` command.
#[derive(Parser, Debug)]
pub struct WriteArgs {
    /// Target file.
    pub path: PathBuf,

    /// Create the file: `open` creates if missing, `fail` requires it to be new.
    /// Without this flag the file must already exist.
    #[arg(long, value_enum, num_args = 0..=1, default_missing_value = "open")]
    pub create: Option<CreatePolicy>,

    /// Permissions for a newly created file, in octal (default from config).
    #[arg(long, value_name = "OCTAL")]
    pub perms: Option<String>,

    #[command(flatten)]
    pub wait: WaitArgs,

    /// Consume stdin, then discard it instead of committing.
    #[arg(long)]
    pub cancel: bool,
}

/// Arguments for the `read` command.
#[derive(Parser, Debug)]
pub struct ReadArgs {
    /// File to read.
    pub path: PathBuf,

    #[command(flatten)]
    pub wait: WaitArgs,
}

/// Arguments for the `delete` command.
#[derive(Parser, Debug)]
pub struct DeleteArgs {
    /// File to delete.
    pub path: PathBuf,

    #[command(flatten)]
    pub wait: WaitArgs,
}

/// Arguments for the `hold` command.
#[derive(Parser, Debug)]
pub struct HoldArgs {
    /// File to lock.
    pub path: PathBuf,

    /// Lock mode.
    #[arg(long, value_enum, default_value = "write")]
    pub mode: ModeArg,

    /// Create the file if needed (see `write --create`).
    #[arg(long, value_enum, num_args = 0..=1, default_missing_value = "open")]
    pub create: Option<CreatePolicy>,

    /// Permissions for a newly created file, in octal (default from config).
    #[arg(long, value_name = "OCTAL")]
    pub perms: Option<String>,

    #[command(flatten)]
    pub wait: WaitArgs,

    /// Cancel instead of closing when released.
    #[arg(long)]
    pub cancel: bool,
}

/// Arguments for the `status` command.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// File to inspect.
    pub path: PathBuf,
}

impl Cli {
    /// Parse command line arguments, leaving exit handling to the caller.
    pub fn try_parse_args() -> Result<Self, clap::Error> {
        Self::try_parse()
    }
}
