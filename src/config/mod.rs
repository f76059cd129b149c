//! Configuration model for atomfile.
//!
//! This module defines the Config struct that tunes commit durability and
//! staging behavior. It supports forward-compatible YAML parsing (unknown
//! fields are ignored), defaults for every field, and validation.

mod model;
mod operations;
pub mod types;


// Re-export public API
pub use model::Config;
pub use types::{Durability, parse_permissions};
