//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};

/// Configuration for atomic file operations.
///
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Commit settings
    // =========================================================================
    /// Sync applied to the staging file before it replaces the target.
    #[serde(default)]
    pub durability: Durability,

    /// Whether to fsync the parent directory after the commit rename.
    #[serde(default = "default_true")]
    pub sync_parent_dir: bool,

    // =========================================================================
    // Staging settings
    // =========================================================================
    /// Marker inserted between the target name and the unique suffix of a
    /// staging file (`.<name><marker><pid>-<n>`).
    #[serde(default = "default_staging_marker")]
    pub staging_marker: String,

    /// Buffer capacity for stream handles.
    #[serde(default = "default_stream_buffer_size")]
    pub stream_buffer_size: usize,

    // =========================================================================
    // CLI settings
    // =========================================================================
    /// Octal permissions used by the CLI when creating files without `--perms`.
    #[serde(default = "default_permissions")]
    pub default_permissions: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            durability: Durability::default(),
            sync_parent_dir: default_true(),
            staging_marker: default_staging_marker(),
            stream_buffer_size: default_stream_buffer_size(),
            default_permissions: default_permissions(),
        }
    }
}
