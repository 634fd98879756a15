//! Deferral record storage
//!
//! On disk the record is a property list with a single date value:
//!
//! ```xml
//! <dict>
//!     <key>DeferOkUntil</key>
//!     <date>2025-12-30T14:00:00Z</date>
//! </dict>
//! ```

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;
use tracing::debug;

use crate::{DeferralStore, StoreResult};

/// Deadline until which a restart-requiring update may be postponed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferralRecord {
    pub defer_ok_until: DateTime<Local>,
}

impl DeferralRecord {
    pub fn new(defer_ok_until: DateTime<Local>) -> Self {
        Self { defer_ok_until }
    }
}

/// Serialized form
#[derive(Debug, Serialize, Deserialize)]
struct PlistRecord {
    #[serde(rename = "DeferOkUntil")]
    defer_ok_until: plist::Date,
}

impl From<&DeferralRecord> for PlistRecord {
    fn from(record: &DeferralRecord) -> Self {
        Self {
            defer_ok_until: plist::Date::from(SystemTime::from(record.defer_ok_until)),
        }
    }
}

impl From<PlistRecord> for DeferralRecord {
    fn from(raw: PlistRecord) -> Self {
        Self {
            defer_ok_until: DateTime::<Local>::from(SystemTime::from(raw.defer_ok_until)),
        }
    }
}

/// Deferral record kept in a property list file at a fixed path
pub struct PlistDeferralStore {
    path: PathBuf,
}

impl PlistDeferralStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl DeferralStore for PlistDeferralStore {
    fn get(&self) -> StoreResult<Option<DeferralRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let raw: PlistRecord = plist::from_file(&self.path)?;
        Ok(Some(raw.into()))
    }

    fn set(&self, record: &DeferralRecord) -> StoreResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        // Write beside the target and rename over it, so a crash leaves
        // either the old record or the new one.
        let temp = self.temp_path();
        {
            let file = std::fs::File::create(&temp)?;
            let mut writer = BufWriter::new(file);
            plist::to_writer_xml(&mut writer, &PlistRecord::from(record))?;
            writer.flush()?;
        }
        std::fs::rename(&temp, &self.path)?;

        debug!(path = %self.path.display(), until = %record.defer_ok_until, "Deferral record written");
        Ok(())
    }

    fn clear(&self) -> StoreResult<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Deferral record removed");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory deferral store (for testing)
#[derive(Default)]
pub struct MemoryDeferralStore {
    record: Mutex<Option<DeferralRecord>>,
}

impl MemoryDeferralStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: DeferralRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }

    /// Current record without going through the trait
    pub fn peek(&self) -> Option<DeferralRecord> {
        *self.record.lock().unwrap()
    }
}

impl DeferralStore for MemoryDeferralStore {
    fn get(&self) -> StoreResult<Option<DeferralRecord>> {
        Ok(*self.record.lock().unwrap())
    }

    fn set(&self, record: &DeferralRecord) -> StoreResult<()> {
        *self.record.lock().unwrap() = Some(*record);
        Ok(())
    }

    fn clear(&self) -> StoreResult<bool> {
        Ok(self.record.lock().unwrap().take().is_some())
    }
}
