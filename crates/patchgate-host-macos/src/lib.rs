//! macOS host adapter for patchgate
//!
//! Provides:
//! - Command execution with combined stdout/stderr capture
//! - Hard wall-clock deadlines, with the whole process group killed when a
//!   deadline passes

mod runner;

pub use runner::*;
