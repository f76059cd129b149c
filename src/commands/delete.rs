//! Implementation of the `atomfile delete` command.

use crate::cli::DeleteArgs;
use atomfile::{AtomicFileManager, Result, Wait};

/// Execute the `atomfile delete` command.
pub fn cmd_delete(files: &AtomicFileManager, args: DeleteArgs) -> Result<()> {
    match args.wait.wait() {
        Wait::Block => files.delete(&args.path)?,
        Wait::Try => files.try_delete(&args.path)?,
    }
    tracing::info!(path = %args.path.display(), "deleted");
    Ok(())
}
