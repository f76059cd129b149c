//! Implementation of the `atomfile write` command.
//!
//! Replaces a file's content with stdin through a Write acquisition.

use super::acquisition;
use crate::cli::WriteArgs;
use atomfile::{AccessMode, AtomError, AtomicFile, AtomicFileManager, Result};
use std::io;

/// Execute the `atomfile write` command.
///
/// The staging copy is truncated and filled from stdin. If reading stdin
/// fails the acquisition is canceled and the target is left untouched.
pub fn cmd_write(files: &AtomicFileManager, args: WriteArgs) -> Result<()> {
    let how = acquisition(args.create, args.perms.as_deref(), files.config())?;
    let mut file = files.acquire(&args.path, AccessMode::Write, how, args.wait.wait())?;

    let bytes = match replace_from_stdin(&mut file) {
        Ok(bytes) => bytes,
        Err(e) => {
            file.cancel();
            return Err(AtomError::fault("write", &args.path, e));
        }
    };

    if args.cancel {
        file.cancel();
        tracing::info!(path = %args.path.display(), bytes, "write discarded");
        return Ok(());
    }

    file.close()?;
    tracing::info!(path = %args.path.display(), bytes, "write committed");
    Ok(())
}

fn replace_from_stdin(file: &mut AtomicFile) -> io::Result<u64> {
    file.set_len(0)?;
    io::copy(&mut io::stdin().lock(), file)
}
