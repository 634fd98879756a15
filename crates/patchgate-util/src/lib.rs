//! Shared utilities for patchgate
//!
//! This crate provides:
//! - Run identifiers
//! - Time utilities (wall-clock `now()` with debug mock time, quiet hours)
//! - Well-known default paths of the platform update machinery

mod ids;
mod paths;
mod time;

pub use ids::*;
pub use paths::*;
pub use time::*;
