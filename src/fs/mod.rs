//! Filesystem utilities for atomfile.
//!
//! This module owns the sibling files that make acquisitions atomic: the
//! staging copy a commit renames into place, the placeholder a create links
//! into place, and the sweep that clears leftovers of crashed writers.

pub mod placeholder;
pub mod staging;

pub use placeholder::Placeholder;
pub use staging::{StagingFile, sweep_stale};
