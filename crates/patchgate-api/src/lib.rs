//! Domain types for patchgate
//!
//! Everything here is recomputed on every run and owned by that run only.
//! The one persisted value, the deferral deadline, lives in `patchgate-store`.

mod decision;
mod types;

pub use decision::*;
pub use types::*;
