//! Time utilities for patchgate
//!
//! Wall-clock time drives both the deferral deadline and the quiet-hours
//! window.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `PATCHGATE_MOCK_TIME` environment variable can be set
//! to override the system time for all time-sensitive operations. This is
//! useful for exercising quiet hours and deferral expiry by hand.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-12-25 02:30:00`)
//!
//! Example:
//! ```bash
//! PATCHGATE_MOCK_TIME="2025-12-25 02:30:00" patchgate 5 22 6 20
//! ```

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "PATCHGATE_MOCK_TIME";

/// Cached mock time offset from the real time when the process started.
/// This allows mock time to advance naturally.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

#[allow(clippy::disallowed_methods)] // This is the internal implementation that wraps Local::now()
fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            if let Ok(mock_time_str) = std::env::var(MOCK_TIME_ENV_VAR) {
                match NaiveDateTime::parse_from_str(&mock_time_str, "%Y-%m-%d %H:%M:%S") {
                    Ok(naive_dt) => {
                        if let Some(mock_dt) = Local.from_local_datetime(&naive_dt).single() {
                            let offset = mock_dt.signed_duration_since(chrono::Local::now());
                            tracing::info!(
                                mock_time = %mock_time_str,
                                offset_secs = offset.num_seconds(),
                                "Mock time enabled"
                            );
                            return Some(offset);
                        }
                        tracing::warn!(
                            mock_time = %mock_time_str,
                            "Failed to convert mock time to local timezone"
                        );
                    }
                    Err(_) => {
                        tracing::warn!(
                            mock_time = %mock_time_str,
                            expected_format = "%Y-%m-%d %H:%M:%S",
                            "Invalid mock time format"
                        );
                    }
                }
            }
            None
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Get the current local time, respecting mock time settings in debug builds.
#[allow(clippy::disallowed_methods)] // This is the wrapper that provides mock time support
pub fn now() -> DateTime<Local> {
    let real_now = chrono::Local::now();

    if let Some(offset) = get_mock_time_offset() {
        real_now + offset
    } else {
        real_now
    }
}

/// Format a deadline the way it is shown to the user in prompts.
pub fn format_deadline(dt: &DateTime<Local>) -> String {
    dt.format("%a, %d %b %H:%M:%S").to_string()
}

/// Hour-granular window during which unattended installs are allowed.
///
/// `start < end` is a same-day window `[start, end)`. `start > end` wraps
/// past midnight. `start == end` is an empty window and never matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub start: u8,
    pub end: u8,
}

impl QuietHours {
    /// Returns `None` unless both bounds are valid hours (0-23).
    pub fn new(start: u8, end: u8) -> Option<Self> {
        if start < 24 && end < 24 {
            Some(Self { start, end })
        } else {
            None
        }
    }

    pub fn contains_hour(&self, hour: u8) -> bool {
        if self.start < self.end {
            self.start <= hour && hour < self.end
        } else if self.start > self.end {
            // Quiet hours run over midnight
            hour >= self.start || hour < self.end
        } else {
            false
        }
    }

    /// Check if the given local datetime falls within the window
    pub fn contains(&self, dt: &DateTime<Local>) -> bool {
        self.contains_hour(dt.hour() as u8)
    }
}

impl fmt::Display for QuietHours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:00-{:02}:00", self.start, self.end)
    }
}
