//! Command implementations for atomfile.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations, after loading config and applying `--umask`.

mod delete;
mod hold;
mod read;
mod status;
mod write;

use crate::cli::{Cli, Command, CreatePolicy};
use atomfile::config::parse_permissions;
use atomfile::{Acquire, AtomError, AtomicFileManager, Config, Result};
use std::path::{Path, PathBuf};

/// Environment variable naming a config file when `--config` is absent.
pub const CONFIG_ENV: &str = "ATOMFILE_CONFIG";

/// Dispatch a command to its implementation.
///
/// This is the main entry point for command execution. Each command
/// is routed to its handler function.
pub fn dispatch(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    if let Some(mask) = cli.umask.as_deref() {
        apply_umask(mask)?;
    }
    let files = AtomicFileManager::new(config);

    match cli.command {
        Command::Write(args) => write::cmd_write(&files, args),
        Command::Read(args) => read::cmd_read(&files, args),
        Command::Delete(args) => delete::cmd_delete(&files, args),
        Command::Hold(args) => hold::cmd_hold(&files, args),
        Command::Status(args) => status::cmd_status(&files, args),
    }
}

fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

    match path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            Config::load(path)
        }
        None => Ok(Config::default()),
    }
}

#[cfg(unix)]
fn apply_umask(mask: &str) -> Result<()> {
    let mask = parse_permissions(mask)
        .filter(|m| *m <= 0o777)
        .ok_or_else(|| {
            AtomError::UserError(format!(
                "invalid umask '{}': expected octal between 000 and 777",
                mask
            ))
        })?;
    // SAFETY: umask has no memory-safety preconditions.
    unsafe {
        libc::umask(mask as libc::mode_t);
    }
    Ok(())
}

#[cfg(not(unix))]
fn apply_umask(_mask: &str) -> Result<()> {
    Err(AtomError::UserError(
        "--umask is only supported on unix".to_string(),
    ))
}

/// Build the acquisition for `--create`/`--perms`.
///
/// `--perms` without `--create` is rejected rather than ignored.
fn acquisition(
    create: Option<CreatePolicy>,
    perms: Option<&str>,
    config: &Config,
) -> Result<Acquire> {
    match (create, perms) {
        (None, None) => Ok(Acquire::Open),
        (None, Some(_)) => Err(AtomError::UserError(
            "--perms only applies together with --create".to_string(),
        )),
        (Some(policy), perms) => {
            let permissions = match perms {
                Some(p) => parse_permissions(p).ok_or_else(|| {
                    AtomError::UserError(format!(
                        "invalid permissions '{}': expected octal no larger than 7777",
                        p
                    ))
                })?,
                None => config.default_mode(),
            };
            Ok(Acquire::Create {
                create_mode: policy.into(),
                permissions,
            })
        }
    }
}
