//! Audit event types

use chrono::{DateTime, Local};
use patchgate_api::{EnforcementDecision, Outcome};
use patchgate_util::RunId;
use serde::{Deserialize, Serialize};

/// Types of audit events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// A run reached a terminal state
    RunCompleted {
        run_id: RunId,
        decision: EnforcementDecision,
        outcome: Outcome,
    },

    /// A run stopped on an error other than a timeout
    RunFailed { run_id: RunId, error: String },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Local>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: patchgate_util::now(),
            event,
        }
    }

    pub fn run_completed(run_id: RunId, outcome: Outcome) -> Self {
        Self::new(AuditEventType::RunCompleted {
            run_id,
            decision: outcome.decision(),
            outcome,
        })
    }

    pub fn run_failed(run_id: RunId, error: impl Into<String>) -> Self {
        Self::new(AuditEventType::RunFailed {
            run_id,
            error: error.into(),
        })
    }
}
