//! Deferral ledger
//!
//! One deadline per machine. It is set the first time a restart-requiring
//! update set is seen and is never pushed back while it is still in the
//! future, however many runs happen in between. The deadline is per
//! machine, not per update set: updates that appear mid-deferral share the
//! existing deadline.

use chrono::{DateTime, Local, SubsecRound};
use patchgate_api::DeferralStatus;
use patchgate_store::{DeferralRecord, DeferralStore};
use std::sync::Arc;
use tracing::{error, info};

use crate::{EngineError, EngineResult};

pub struct DeferralLedger {
    store: Arc<dyn DeferralStore>,
}

impl DeferralLedger {
    pub fn new(store: Arc<dyn DeferralStore>) -> Self {
        Self { store }
    }

    /// How long the user may still defer.
    ///
    /// Creates the record (`now + limit_days`) if there is none. An
    /// unreadable record counts as exhausted, so a damaged file never buys
    /// a fresh grace period.
    pub fn deferral_ok_until(
        &self,
        limit_days: u32,
        now: DateTime<Local>,
    ) -> EngineResult<DeferralStatus> {
        let existing = match self.store.get() {
            Ok(record) => record,
            Err(e) => {
                error!(error = %e, "Deferral record unreadable, treating deferral as exhausted");
                return Ok(DeferralStatus::NotAllowed { expired_at: now });
            }
        };

        match existing {
            Some(record) if now < record.defer_ok_until => {
                info!(until = %record.defer_ok_until, "OK to defer");
                Ok(DeferralStatus::AllowedUntil {
                    deadline: record.defer_ok_until,
                })
            }
            Some(record) => {
                info!(until = %record.defer_ok_until, "Not OK to defer, deadline is in the past");
                Ok(DeferralStatus::NotAllowed {
                    expired_at: record.defer_ok_until,
                })
            }
            None => {
                // Whole seconds, so the value survives the round trip to disk
                let deadline = chrono::Duration::try_days(i64::from(limit_days))
                    .and_then(|grace| now.checked_add_signed(grace))
                    .ok_or(EngineError::DeadlineOutOfRange { limit_days })?
                    .trunc_subsecs(0);
                self.store.set(&DeferralRecord::new(deadline))?;
                info!(until = %deadline, limit_days, "Created deferral record");
                Ok(DeferralStatus::AllowedUntil { deadline })
            }
        }
    }

    /// Drop the record. Returns whether one existed.
    pub fn clear(&self) -> EngineResult<bool> {
        let removed = self.store.clear()?;
        if removed {
            info!("Removed deferral record");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use patchgate_store::{MemoryDeferralStore, PlistDeferralStore};

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 12, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn first_call_creates_deadline() {
        let store = Arc::new(MemoryDeferralStore::new());
        let ledger = DeferralLedger::new(store.clone());

        let status = ledger.deferral_ok_until(5, now()).unwrap();
        let expected = now() + chrono::Duration::days(5);
        assert_eq!(status, DeferralStatus::AllowedUntil { deadline: expected });
        assert_eq!(store.peek().unwrap().defer_ok_until, expected);
    }

    #[test]
    fn repeated_calls_never_extend() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(PlistDeferralStore::new(dir.path().join("Deferral.plist")));
        let ledger = DeferralLedger::new(store);

        let first = ledger.deferral_ok_until(5, now()).unwrap();
        let second = ledger.deferral_ok_until(5, now()).unwrap();
        let next_day = ledger
            .deferral_ok_until(5, now() + chrono::Duration::days(1))
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first, next_day);
    }

    #[test]
    fn sub_second_now_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(PlistDeferralStore::new(dir.path().join("Deferral.plist")));
        let ledger = DeferralLedger::new(store);
        let precise = now() + chrono::Duration::milliseconds(437);

        let first = ledger.deferral_ok_until(5, precise).unwrap();
        let second = ledger.deferral_ok_until(5, precise).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn expired_deadline_is_not_allowed() {
        let store = Arc::new(MemoryDeferralStore::new());
        let ledger = DeferralLedger::new(store.clone());

        let deadline = ledger.deferral_ok_until(5, now()).unwrap().deadline().unwrap();
        let later = deadline + chrono::Duration::seconds(1);

        assert_eq!(
            ledger.deferral_ok_until(5, later).unwrap(),
            DeferralStatus::NotAllowed {
                expired_at: deadline
            }
        );
        // Exactly at the deadline is already too late
        assert!(ledger.deferral_ok_until(5, deadline).unwrap().deadline().is_none());
        // The record is left alone
        assert_eq!(store.peek().unwrap().defer_ok_until, deadline);
    }

    #[test]
    fn clear_resets_the_deadline() {
        let store = Arc::new(MemoryDeferralStore::new());
        let ledger = DeferralLedger::new(store.clone());

        ledger.deferral_ok_until(5, now()).unwrap();
        assert!(ledger.clear().unwrap());
        assert!(!ledger.clear().unwrap());

        let later = now() + chrono::Duration::days(10);
        let status = ledger.deferral_ok_until(2, later).unwrap();
        assert_eq!(status.deadline(), Some(later + chrono::Duration::days(2)));
    }

    #[test]
    fn corrupt_record_counts_as_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Deferral.plist");
        std::fs::write(&path, "garbage").unwrap();
        let ledger = DeferralLedger::new(Arc::new(PlistDeferralStore::new(&path)));

        let status = ledger.deferral_ok_until(3, now()).unwrap();
        assert_eq!(status, DeferralStatus::NotAllowed { expired_at: now() });
        // Still there until the forced install clears it
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "garbage");

        assert!(ledger.clear().unwrap());
        let fresh = ledger.deferral_ok_until(3, now()).unwrap();
        assert_eq!(fresh.deadline(), Some(now() + chrono::Duration::days(3)));
    }

    #[test]
    fn unrepresentable_deadline_is_an_error() {
        let store = Arc::new(MemoryDeferralStore::new());
        let ledger = DeferralLedger::new(store.clone());

        let err = ledger.deferral_ok_until(u32::MAX, now()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::DeadlineOutOfRange { limit_days: u32::MAX }
        ));
        assert!(store.peek().is_none());
    }
}
