//! Implementation of the `atomfile hold` command.
//!
//! Acquires a file and keeps it locked until released through stdin. Lets
//! scripts and tests stand up an independent lock holder.

use super::acquisition;
use crate::cli::HoldArgs;
use atomfile::{AtomError, AtomicFileManager, Result};
use std::io::{self, BufRead, Write};

/// Line printed on stdout once the lock is held.
pub const LOCKED_BANNER: &str = "locked";

/// Execute the `atomfile hold` command.
///
/// Prints `locked`, then waits for a line or EOF on stdin before closing
/// (or, with `--cancel`, canceling) the acquisition.
pub fn cmd_hold(files: &AtomicFileManager, args: HoldArgs) -> Result<()> {
    let how = acquisition(args.create, args.perms.as_deref(), files.config())?;
    let file = files.acquire(&args.path, args.mode.into(), how, args.wait.wait())?;

    let announced = {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", LOCKED_BANNER).and_then(|()| out.flush())
    };
    if let Err(e) = announced {
        file.cancel();
        return Err(AtomError::fault("announce lock on", &args.path, e));
    }
    tracing::debug!(path = %args.path.display(), "holding lock");

    let mut line = String::new();
    if let Err(e) = io::stdin().lock().read_line(&mut line) {
        tracing::warn!(error = %e, "reading stdin failed, releasing");
    }

    if args.cancel {
        file.cancel();
        Ok(())
    } else {
        file.close()
    }
}
