//! Observed state of the machine for one run

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// A single pending update as reported by the update tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub name: String,
    pub restart_required: bool,
}

impl Update {
    pub fn new(name: impl Into<String>, restart_required: bool) -> Self {
        Self {
            name: name.into(),
            restart_required,
        }
    }
}

/// Classified result of an update check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSet {
    updates: Vec<Update>,
    any_updates_available: bool,
    network_unavailable: bool,
}

impl UpdateSet {
    /// The update server reported nothing to install.
    pub fn none() -> Self {
        Self::default()
    }

    /// The update server could not be reached.
    pub fn network_unavailable() -> Self {
        Self {
            network_unavailable: true,
            ..Self::default()
        }
    }

    pub fn available(updates: Vec<Update>) -> Self {
        Self {
            updates,
            any_updates_available: true,
            network_unavailable: false,
        }
    }

    pub fn updates(&self) -> &[Update] {
        &self.updates
    }

    pub fn any_updates_available(&self) -> bool {
        self.any_updates_available
    }

    pub fn is_network_unavailable(&self) -> bool {
        self.network_unavailable
    }

    pub fn restart_required(&self) -> bool {
        self.updates.iter().any(|u| u.restart_required)
    }

    pub fn restart_required_updates(&self) -> impl Iterator<Item = &Update> {
        self.updates.iter().filter(|u| u.restart_required)
    }

    /// Newline-joined names of the updates that need a restart, for prompts.
    pub fn printable_list(&self) -> String {
        self.restart_required_updates()
            .map(|u| u.name.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Who is using the machine right now
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    /// Nobody on the console and no other sessions
    NoConsoleUser,
    /// Someone is logged into the local graphical session
    LocalConsoleUser { username: String },
    /// No console user, but the session listing shows somebody (SSH, tty)
    AmbiguousRemotePresence,
}

impl SessionState {
    pub fn console_user(&self) -> Option<&str> {
        match self {
            SessionState::LocalConsoleUser { username } => Some(username),
            _ => None,
        }
    }

    pub fn nobody_logged_in(&self) -> bool {
        matches!(self, SessionState::NoConsoleUser)
    }
}

/// Power situation of the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerState {
    pub is_portable: bool,
    pub on_ac_power: bool,
    /// `None` when the battery level could not be read
    pub battery_percent: Option<u8>,
}

impl PowerState {
    /// Non-portable machines have no battery constraint. Portable machines
    /// must report a readable level at or above `min_percent`.
    pub fn meets_battery_threshold(&self, min_percent: u8) -> bool {
        if !self.is_portable {
            return true;
        }
        matches!(self.battery_percent, Some(level) if level >= min_percent)
    }

    /// Safe to install with nobody watching.
    pub fn safe_for_unattended_install(&self, min_percent: u8) -> bool {
        if !self.is_portable {
            return true;
        }
        self.on_ac_power && self.meets_battery_threshold(min_percent)
    }
}

/// Answer of the deferral ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeferralStatus {
    /// The user may still defer, up to this deadline
    AllowedUntil { deadline: DateTime<Local> },
    /// The deadline has passed
    NotAllowed { expired_at: DateTime<Local> },
}

impl DeferralStatus {
    pub fn deadline(&self) -> Option<DateTime<Local>> {
        match self {
            DeferralStatus::AllowedUntil { deadline } => Some(*deadline),
            DeferralStatus::NotAllowed { .. } => None,
        }
    }
}
