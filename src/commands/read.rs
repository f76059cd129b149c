//! Implementation of the `atomfile read` command.

use crate::cli::ReadArgs;
use atomfile::{AccessMode, Acquire, AtomError, AtomicFileManager, Result};
use std::io::{self, Write};

/// Execute the `atomfile read` command.
///
/// Copies the file to stdout while holding a shared lock, so the output is
/// never a mix of two versions.
pub fn cmd_read(files: &AtomicFileManager, args: ReadArgs) -> Result<()> {
    let mut stream =
        files.acquire_stream(&args.path, AccessMode::Read, Acquire::Open, args.wait.wait())?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match io::copy(&mut stream, &mut out).and_then(|_| out.flush()) {
        Ok(()) => stream.close(),
        Err(e) => {
            stream.cancel();
            Err(AtomError::fault("copy to stdout", &args.path, e))
        }
    }
}
