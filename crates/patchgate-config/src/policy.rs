//! Validated policy structures

use crate::schema::{RawConfig, RawPaths, RawPrompt, RawSession, RawTimeouts};
use patchgate_util::{
    data_dir_without_env, QuietHours, DEFERRAL_FILE, INSTALLER_LOCK_FILE, LOGIN_WINDOW_AGENT,
    LOGOUT_OPTIONS_FILE, LOGOUT_TRIGGER_FILE, PROMPT_HELPER, SOFTWARE_UPDATE_ICON,
    SOFTWARE_UPDATE_TOOL, UPDATE_INDEX,
};
use std::path::PathBuf;
use std::time::Duration;

/// Everything a run needs to know
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    pub thresholds: Thresholds,
    pub settings: Settings,
}

/// The four administrator-supplied invocation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// Days a user may postpone a restart-requiring update
    pub defer_limit_days: u32,
    /// Window in which unattended installs may run
    pub quiet_hours: QuietHours,
    /// Minimum charge for an unattended install on a portable
    pub min_battery_percent: u8,
}

/// Resolved settings file contents
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub paths: Paths,
    pub timeouts: Timeouts,
    pub prompt: PromptText,
    pub session: SessionSettings,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            paths: Paths::from_raw(raw.paths),
            timeouts: Timeouts::from_raw(raw.timeouts),
            prompt: PromptText::from_raw(raw.prompt),
            session: SessionSettings::from_raw(raw.session),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub update_tool: PathBuf,
    pub prompt_helper: PathBuf,
    pub icon: PathBuf,
    pub update_index: PathBuf,
    pub trigger_file: PathBuf,
    pub options_file: PathBuf,
    pub deferral_file: PathBuf,
    pub installer_lock: PathBuf,
    pub login_window_agent: PathBuf,
    pub data_dir: PathBuf,
}

impl Paths {
    fn from_raw(raw: RawPaths) -> Self {
        let defaults = Self::default();
        Self {
            update_tool: raw.update_tool.unwrap_or(defaults.update_tool),
            prompt_helper: raw.prompt_helper.unwrap_or(defaults.prompt_helper),
            icon: raw.icon.unwrap_or(defaults.icon),
            update_index: raw.update_index.unwrap_or(defaults.update_index),
            trigger_file: raw.trigger_file.unwrap_or(defaults.trigger_file),
            options_file: raw.options_file.unwrap_or(defaults.options_file),
            deferral_file: raw.deferral_file.unwrap_or(defaults.deferral_file),
            installer_lock: raw.installer_lock.unwrap_or(defaults.installer_lock),
            login_window_agent: raw.login_window_agent.unwrap_or(defaults.login_window_agent),
            data_dir: raw.data_dir.unwrap_or(defaults.data_dir),
        }
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            update_tool: PathBuf::from(SOFTWARE_UPDATE_TOOL),
            prompt_helper: PathBuf::from(PROMPT_HELPER),
            icon: PathBuf::from(SOFTWARE_UPDATE_ICON),
            update_index: PathBuf::from(UPDATE_INDEX),
            trigger_file: PathBuf::from(LOGOUT_TRIGGER_FILE),
            options_file: PathBuf::from(LOGOUT_OPTIONS_FILE),
            deferral_file: PathBuf::from(DEFERRAL_FILE),
            installer_lock: PathBuf::from(INSTALLER_LOCK_FILE),
            login_window_agent: PathBuf::from(LOGIN_WINDOW_AGENT),
            data_dir: data_dir_without_env(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub check: Duration,
    pub download: Duration,
    pub install: Duration,
    pub probe: Duration,
    pub prompt: Duration,
    pub settle: Duration,
}

impl Timeouts {
    fn from_raw(raw: RawTimeouts) -> Self {
        let defaults = Self::default();
        let secs = |value: Option<u64>, default: Duration| {
            value.map(Duration::from_secs).unwrap_or(default)
        };
        Self {
            check: secs(raw.check, defaults.check),
            download: secs(raw.download, defaults.download),
            install: secs(raw.install, defaults.install),
            probe: secs(raw.probe, defaults.probe),
            prompt: secs(raw.prompt, defaults.prompt),
            settle: secs(raw.settle, defaults.settle),
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            check: Duration::from_secs(180),
            download: Duration::from_secs(600),
            // An hour should cover even large OS updates
            install: Duration::from_secs(3600),
            probe: Duration::from_secs(30),
            // The helper's own -timeout is 99999s
            prompt: Duration::from_secs(100_000),
            settle: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptText {
    pub title: String,
    pub login_window_heading: String,
    pub login_window_description: String,
}

impl PromptText {
    fn from_raw(raw: RawPrompt) -> Self {
        let defaults = Self::default();
        Self {
            title: raw.title.unwrap_or(defaults.title),
            login_window_heading: raw
                .login_window_heading
                .unwrap_or(defaults.login_window_heading),
            login_window_description: raw
                .login_window_description
                .unwrap_or(defaults.login_window_description),
        }
    }
}

impl Default for PromptText {
    fn default() -> Self {
        Self {
            title: "Managed Desktop".into(),
            login_window_heading: "Installing macOS updates...".into(),
            login_window_description: "Please do not turn off this computer.".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub console_sentinels: Vec<String>,
}

impl SessionSettings {
    fn from_raw(raw: RawSession) -> Self {
        Self {
            console_sentinels: raw
                .console_sentinels
                .unwrap_or_else(|| Self::default().console_sentinels),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            // /dev/console belongs to root at the login window
            console_sentinels: vec!["loginwindow".into(), "root".into(), "_mbsetupuser".into()],
        }
    }
}
