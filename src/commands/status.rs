//! Implementation of the `atomfile status` command.
//!
//! Prints size, permissions and lock state of a file as JSON.

use crate::cli::StatusArgs;
use atomfile::{AtomError, AtomicFileManager, Result};

/// Execute the `atomfile status` command.
pub fn cmd_status(files: &AtomicFileManager, args: StatusArgs) -> Result<()> {
    let status = files.status(&args.path)?;
    let json = serde_json::to_string_pretty(&status)
        .map_err(|e| AtomError::UserError(format!("failed to serialize status: {}", e)))?;
    println!("{}", json);
    Ok(())
}
