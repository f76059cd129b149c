//! atomfile: advisory-locked atomic file access from the command line.
//!
//! This is the main entry point for the `atomfile` CLI. It parses arguments,
//! dispatches to the appropriate command handler, and handles errors with
//! proper exit codes.

mod cli;
mod commands;

use atomfile::{exit_codes, logging};
use cli::Cli;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = match Cli::try_parse_args() {
        Ok(cli) => cli,
        Err(err) => {
            // Usage errors exit with USER_ERROR; clap's default 2 is NOT_FOUND here.
            let code = if err.use_stderr() {
                exit_codes::USER_ERROR
            } else {
                exit_codes::SUCCESS
            };
            let _ = err.print();
            return ExitCode::from(code as u8);
        }
    };
    logging::init();

    match commands::dispatch(cli) {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {} ({})", err, err.code());

            ExitCode::from(err.exit_code() as u8)
        }
    }
}
