//! Persistence layer for patchgate
//!
//! Provides:
//! - The per-machine deferral record (property list file, or in memory for
//!   tests)
//! - Audit log of run outcomes (append-only, SQLite)

mod audit;
mod deferral;
mod sqlite;
mod traits;

pub use audit::*;
pub use deferral::*;
pub use sqlite::*;
pub use traits::*;

use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<plist::Error> for StoreError {
    fn from(e: plist::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
