//! Raw settings schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw settings as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Locations of tools, platform files and our own state
    #[serde(default)]
    pub paths: RawPaths,

    /// Per-command time budgets
    #[serde(default)]
    pub timeouts: RawTimeouts,

    /// Wording and branding of user-facing windows
    #[serde(default)]
    pub prompt: RawPrompt,

    /// Session detection tweaks
    #[serde(default)]
    pub session: RawSession,
}

/// Path overrides. Anything left unset uses the platform default.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawPaths {
    pub update_tool: Option<PathBuf>,
    pub prompt_helper: Option<PathBuf>,
    pub icon: Option<PathBuf>,
    pub update_index: Option<PathBuf>,
    pub trigger_file: Option<PathBuf>,
    pub options_file: Option<PathBuf>,
    pub deferral_file: Option<PathBuf>,
    pub installer_lock: Option<PathBuf>,
    pub login_window_agent: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
}

/// Time budgets in seconds
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawTimeouts {
    /// Listing available updates
    pub check: Option<u64>,
    /// Download-only mode
    pub download: Option<u64>,
    /// Full install
    pub install: Option<u64>,
    /// Session, power and hardware probes, logout and service requests
    pub probe: Option<u64>,
    /// How long a prompt may stay on screen
    pub prompt: Option<u64>,
    /// Pause after signalling the update daemons
    pub settle: Option<u64>,
}

/// Prompt wording
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawPrompt {
    /// Window title of utility prompts
    pub title: Option<String>,
    /// Heading of the full-screen login window notice
    pub login_window_heading: Option<String>,
    /// Body of the full-screen login window notice
    pub login_window_description: Option<String>,
}

/// Session detection
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSession {
    /// Console owners that mean "nobody is logged in"
    pub console_sentinels: Option<Vec<String>>,
}
