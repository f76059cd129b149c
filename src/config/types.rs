//! Configuration types and defaults for atomfile.

use serde::{Deserialize, Serialize};

/// How hard a commit pushes staged data to stable storage before the rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
    /// `fsync` data and metadata (default).
    #[default]
    Full,
    /// `fdatasync`: data only.
    Data,
    /// No sync; the rename alone orders the commit.
    None,
}

/// Highest permission value accepted: rwx for all plus setuid/setgid/sticky.
pub const MAX_PERMISSIONS: u32 = 0o7777;

/// Parse an octal permission string such as `"0644"` or `"600"`.
///
/// A leading `0o` is accepted. Returns `None` for non-octal input or values
/// above `0o7777`.
pub fn parse_permissions(s: &str) -> Option<u32> {
    let digits = s.trim();
    let digits = digits.strip_prefix("0o").unwrap_or(digits);
    if digits.is_empty() {
        return None;
    }
    u32::from_str_radix(digits, 8)
        .ok()
        .filter(|mode| *mode <= MAX_PERMISSIONS)
}

pub(crate) fn default_true() -> bool {
    true
}

pub(crate) fn default_staging_marker() -> String {
    ".bak~~".to_string()
}

pub(crate) fn default_stream_buffer_size() -> usize {
    8 * 1024
}

pub(crate) fn default_permissions() -> String {
    "0644".to_string()
}
