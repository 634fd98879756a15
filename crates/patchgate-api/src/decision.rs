//! Decisions and terminal states of an enforcement run

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::{PowerState, SessionState};

/// Exit status for a run that completed, whatever it decided
pub const EXIT_OK: u8 = 0;

/// Exit status for a run aborted because an external command timed out
pub const EXIT_TIMEOUT: u8 = 255;

/// The single action chosen for one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementDecision {
    NoAction,
    InstallSilentlyNow,
    OfferDeferralToUser,
    ForceLogoutNow,
    UnattendedInstallAtLoginWindow,
    AbortedTimeout,
    AbortedConcurrentInstallerRunning,
}

/// Terminal state reached by a run, with what led there
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Another installer holds its lock; nothing was touched
    AbortedConcurrentInstallerRunning,

    /// Nothing to install, or the update server was unreachable
    NoUpdates { network_unavailable: bool },

    /// Updates installed in the background; none needed a restart
    NoRestartRequired { installed: usize },

    /// The console user chose to postpone until `deadline`
    DeferGranted {
        username: String,
        deadline: DateTime<Local>,
    },

    /// Updates staged for install-at-logout and the user logged out
    ForceLogout {
        username: String,
        deferral_exhausted: bool,
    },

    /// Login window locked, updates installed, reboot requested
    UnattendedInstall,

    /// Nobody logged in during quiet hours, but power was not safe
    SkippedUnsafe { power: PowerState },

    /// Restart needed but a remote session is present or it is outside
    /// quiet hours
    RestartRequiredNoSession {
        session: SessionState,
        in_quiet_hours: bool,
    },

    /// An external command exceeded its time budget
    AbortedTimeout { command: String },
}

impl Outcome {
    pub fn decision(&self) -> EnforcementDecision {
        match self {
            Outcome::AbortedConcurrentInstallerRunning => {
                EnforcementDecision::AbortedConcurrentInstallerRunning
            }
            Outcome::NoUpdates { .. } => EnforcementDecision::NoAction,
            Outcome::NoRestartRequired { .. } => EnforcementDecision::InstallSilentlyNow,
            Outcome::DeferGranted { .. } => EnforcementDecision::OfferDeferralToUser,
            Outcome::ForceLogout { .. } => EnforcementDecision::ForceLogoutNow,
            Outcome::UnattendedInstall => EnforcementDecision::UnattendedInstallAtLoginWindow,
            Outcome::SkippedUnsafe { .. } => EnforcementDecision::NoAction,
            Outcome::RestartRequiredNoSession { .. } => EnforcementDecision::NoAction,
            Outcome::AbortedTimeout { .. } => EnforcementDecision::AbortedTimeout,
        }
    }

    /// Process exit status for this outcome
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::AbortedTimeout { .. } => EXIT_TIMEOUT,
            _ => EXIT_OK,
        }
    }

    /// Short machine-friendly name, used in logs and the audit log
    pub fn name(&self) -> &'static str {
        match self {
            Outcome::AbortedConcurrentInstallerRunning => "aborted_concurrent_installer_running",
            Outcome::NoUpdates { .. } => "no_updates",
            Outcome::NoRestartRequired { .. } => "no_restart_required",
            Outcome::DeferGranted { .. } => "defer_granted",
            Outcome::ForceLogout { .. } => "force_logout",
            Outcome::UnattendedInstall => "unattended_install",
            Outcome::SkippedUnsafe { .. } => "skipped_unsafe",
            Outcome::RestartRequiredNoSession { .. } => "restart_required_no_session",
            Outcome::AbortedTimeout { .. } => "aborted_timeout",
        }
    }
}
