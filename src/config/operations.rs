//! Config loading, validation, and utility operations.

use super::model::Config;
use super::types::parse_permissions;
use crate::error::{AtomError, Result};
use std::path::Path;

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully loaded and validated config
    /// * `Err(AtomError::UserError)` - Read error, parse error or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            AtomError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| AtomError::UserError(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            AtomError::UserError(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `staging_marker` must be non-empty and contain no path separator
    /// - `stream_buffer_size` must be positive
    /// - `default_permissions` must be an octal value no larger than `07777`
    pub fn validate(&self) -> Result<()> {
        if self.staging_marker.is_empty() {
            return Err(AtomError::UserError(
                "config validation failed: staging_marker must be non-empty".to_string(),
            ));
        }
        if self.staging_marker.contains('/') || self.staging_marker.contains('\0') {
            return Err(AtomError::UserError(format!(
                "config validation failed: staging_marker must not contain '/' (found '{}')",
                self.staging_marker
            )));
        }

        if self.stream_buffer_size == 0 {
            return Err(AtomError::UserError(
                "config validation failed: stream_buffer_size must be greater than 0".to_string(),
            ));
        }

        if parse_permissions(&self.default_permissions).is_none() {
            return Err(AtomError::UserError(format!(
                "config validation failed: default_permissions must be octal and at most 07777 (found '{}')",
                self.default_permissions
            )));
        }

        Ok(())
    }

    /// `default_permissions` as mode bits. Falls back to `0o644` when the
    /// value was never validated and does not parse.
    pub fn default_mode(&self) -> u32 {
        parse_permissions(&self.default_permissions).unwrap_or(0o644)
    }
}
