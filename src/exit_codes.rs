//! Exit code constants for the atomfile CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config)
//! - 2: File not found
//! - 3: File already exists
//! - 4: Lock held by another holder (non-blocking request)
//! - 5: I/O fault

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments or invalid configuration.
pub const USER_ERROR: i32 = 1;

/// The target file does not exist.
pub const NOT_FOUND: i32 = 2;

/// The target file exists and the create policy forbids it.
pub const DUPLICATE: i32 = 3;

/// A non-blocking acquisition was refused because the lock is held.
pub const WOULD_BLOCK: i32 = 4;

/// Underlying I/O failure.
pub const FAULT: i32 = 5;
