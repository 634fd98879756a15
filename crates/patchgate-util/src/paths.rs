//! Well-known paths used by patchgate
//!
//! Most of these belong to the platform's software update machinery and are
//! fixed by the operating system. The deferral record, the installer lock
//! marker and the audit database are ours; their defaults can be moved with
//! the settings file.

use std::path::PathBuf;

/// Environment variable for overriding the settings file path
pub const PATCHGATE_CONFIG_ENV: &str = "PATCHGATE_CONFIG";

/// Environment variable for overriding the data directory
pub const PATCHGATE_DATA_DIR_ENV: &str = "PATCHGATE_DATA_DIR";

/// Software update command-line tool
pub const SOFTWARE_UPDATE_TOOL: &str = "/usr/sbin/softwareupdate";

/// Full-screen / utility window helper used to talk to the user
pub const PROMPT_HELPER: &str =
    "/Library/Application Support/JAMF/bin/jamfHelper.app/Contents/MacOS/jamfHelper";

/// Icon shown in prompts and the login-window notice
pub const SOFTWARE_UPDATE_ICON: &str =
    "/System/Library/CoreServices/Software Update.app/Contents/Resources/SoftwareUpdate.icns";

/// Index of downloaded products, owned by the update daemon
pub const UPDATE_INDEX: &str = "/Library/Updates/index.plist";

/// Empty marker whose existence means "install pending updates at logout"
pub const LOGOUT_TRIGGER_FILE: &str = "/var/db/.AppleLaunchSoftwareUpdate";

/// Options record read by the logout installer
pub const LOGOUT_OPTIONS_FILE: &str = "/var/db/.SoftwareUpdateOptions";

/// Persisted deferral record
pub const DEFERRAL_FILE: &str = "/var/db/PatchgateDeferral.plist";

/// Present while another installer mechanism (enrollment package) is running
pub const INSTALLER_LOCK_FILE: &str = "/var/run/PatchgateInstallerRunning";

/// Login-window helper agent descriptor
pub const LOGIN_WINDOW_AGENT: &str = "/Library/LaunchAgents/com.patchgate.loginwindow-notice.plist";

/// Default settings file, read only if it exists
pub const DEFAULT_CONFIG_FILE: &str = "/Library/Preferences/com.patchgate.toml";

// System tools consulted or driven by a run
pub const PMSET: &str = "/usr/bin/pmset";
pub const SYSCTL: &str = "/usr/sbin/sysctl";
pub const STAT: &str = "/usr/bin/stat";
pub const W: &str = "/usr/bin/w";
pub const SUDO: &str = "/usr/bin/sudo";
pub const OSASCRIPT: &str = "/usr/bin/osascript";
pub const KILLALL: &str = "/usr/bin/killall";
pub const LAUNCHCTL: &str = "/bin/launchctl";
pub const REBOOT: &str = "/sbin/reboot";

/// Application subdirectory name
const APP_DIR: &str = "patchgate";

/// Get the default settings file path.
///
/// Order of precedence:
/// 1. `$PATCHGATE_CONFIG` environment variable (if set)
/// 2. [`DEFAULT_CONFIG_FILE`]
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(PATCHGATE_CONFIG_ENV) {
        return PathBuf::from(path);
    }

    PathBuf::from(DEFAULT_CONFIG_FILE)
}

/// Default data directory (audit database). The binary applies
/// `$PATCHGATE_DATA_DIR` on top of this.
pub fn data_dir_without_env() -> PathBuf {
    PathBuf::from("/var/db").join(APP_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_contains_patchgate() {
        let path = data_dir_without_env();
        assert!(path.to_string_lossy().contains("patchgate"));
    }

    #[test]
    fn agent_descriptor_is_a_plist() {
        assert!(LOGIN_WINDOW_AGENT.ends_with(".plist"));
        assert!(DEFERRAL_FILE.ends_with(".plist"));
    }
}
