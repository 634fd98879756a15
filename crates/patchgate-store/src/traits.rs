//! Store trait definitions

use crate::{AuditEvent, DeferralRecord, StoreResult};

/// Holds at most one deferral record per machine
pub trait DeferralStore: Send + Sync {
    /// Read the current record, if any
    fn get(&self) -> StoreResult<Option<DeferralRecord>>;

    /// Replace the record as a single unit
    fn set(&self, record: &DeferralRecord) -> StoreResult<()>;

    /// Remove the record. Returns whether one existed.
    fn clear(&self) -> StoreResult<bool>;
}

/// Append-only history of runs
pub trait AuditLog: Send + Sync {
    /// Append an audit event
    fn append(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn recent(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    /// Check if the log is usable
    fn is_healthy(&self) -> bool;
}
