//! Integration tests for patchgate
//!
//! These drive whole runs through the library crates against a scripted
//! command runner and on-disk state, plus a few invocations of the binary
//! that fail before touching the machine.

use chrono::{DateTime, Duration, Local, TimeZone};
use patchgate_api::{EnforcementDecision, Outcome};
use patchgate_config::{load_policy, Policy};
use patchgate_core::EnforcementController;
use patchgate_host_api::MockRunner;
use patchgate_store::{DeferralStore, PlistDeferralStore};
use plist::{Dictionary, Value};
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

const RESTART_LISTING: &str = "Software Update Tool\n\nFinding available software\nSoftware Update found the following new or updated software:\n* Label: Security Update 2021-007 Catalina-19H1519\n\tTitle: Security Update 2021-007 Catalina, Version: 19H1519, Size: 1853621K, Recommended: YES, Action: restart, \n";

fn write_settings(dir: &Path) -> std::path::PathBuf {
    let settings = format!(
        r#"
config_version = 1

[paths]
update_tool = "/usr/sbin/softwareupdate"
prompt_helper = "/opt/helper"
update_index = "{root}/index.plist"
trigger_file = "{root}/.AppleLaunchSoftwareUpdate"
options_file = "{root}/.SoftwareUpdateOptions"
deferral_file = "{root}/PatchgateDeferral.plist"
installer_lock = "{root}/installer.lock"
login_window_agent = "{root}/agent.plist"
data_dir = "{root}/data"

[timeouts]
settle = 0

[prompt]
title = "Example Corp IT"
"#,
        root = dir.display()
    );
    let path = dir.join("patchgate.toml");
    std::fs::write(&path, settings).unwrap();

    let mut products = Dictionary::new();
    products.insert("041-12345".into(), Value::from("041-12345/SecUpd.pkg"));
    let mut index = Dictionary::new();
    index.insert("ProductPaths".into(), Value::Dictionary(products));
    Value::Dictionary(index)
        .to_file_xml(dir.join("index.plist"))
        .unwrap();

    path
}

fn policy(dir: &Path) -> Policy {
    let settings = write_settings(dir);
    // Management agents prepend mount point, computer name and user
    let params: Vec<String> = ["/", "mac-042", "alice", "5", "22", "6", "20"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    load_policy(&params, Some(settings.as_path()), true).unwrap()
}

fn noon() -> DateTime<Local> {
    Local.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).single().unwrap()
}

#[tokio::test]
async fn deferral_then_forced_logout_after_deadline() {
    let dir = tempfile::tempdir().unwrap();
    let policy = policy(dir.path());

    let mock = Arc::new(MockRunner::new());
    mock.on("/usr/sbin/softwareupdate -l -r", RESTART_LISTING)
        .on("/usr/bin/stat -f %Su /dev/console", "alice\n")
        .on_exit("/opt/helper", "", 2);

    let store = Arc::new(PlistDeferralStore::new(dir.path().join("PatchgateDeferral.plist")));
    let controller = EnforcementController::new(&policy, mock.clone(), store.clone());

    let first = controller.run(noon()).await.unwrap();
    let deadline = noon() + Duration::days(5);
    assert_eq!(
        first,
        Outcome::DeferGranted {
            username: "alice".into(),
            deadline
        }
    );
    assert!(mock.calls().iter().any(|c| c.contains("Example Corp IT")));

    // Record is a plain property list keyed DeferOkUntil
    let raw = Value::from_file(dir.path().join("PatchgateDeferral.plist")).unwrap();
    assert!(raw.as_dictionary().unwrap().get("DeferOkUntil").and_then(Value::as_date).is_some());
    assert_eq!(store.get().unwrap().unwrap().defer_ok_until, deadline);

    // A day later the deadline stands
    controller.run(noon() + Duration::days(1)).await.unwrap();
    assert_eq!(store.get().unwrap().unwrap().defer_ok_until, deadline);

    // Past the deadline there is no choice left
    let late = controller.run(deadline + Duration::minutes(1)).await.unwrap();
    assert_eq!(
        late,
        Outcome::ForceLogout {
            username: "alice".into(),
            deferral_exhausted: true
        }
    );
    assert!(store.get().unwrap().is_none());
    assert!(dir.path().join(".AppleLaunchSoftwareUpdate").exists());
    assert!(mock.was_called("/usr/bin/sudo -u alice /usr/bin/osascript"));
}

#[tokio::test]
async fn timed_out_check_aborts_with_timeout_exit() {
    let dir = tempfile::tempdir().unwrap();
    let policy = policy(dir.path());

    let mock = Arc::new(MockRunner::new());
    mock.on_timeout("/usr/sbin/softwareupdate -l -r");
    let store = Arc::new(PlistDeferralStore::new(dir.path().join("PatchgateDeferral.plist")));
    let controller = EnforcementController::new(&policy, mock.clone(), store);

    let outcome = controller.run(noon()).await.unwrap();
    assert_eq!(
        outcome,
        Outcome::AbortedTimeout {
            command: "/usr/sbin/softwareupdate -l -r".into()
        }
    );
    assert_eq!(outcome.decision(), EnforcementDecision::AbortedTimeout);
    assert_eq!(outcome.exit_code(), 255);
    assert_eq!(mock.calls().len(), 1);
}

#[tokio::test]
async fn concurrent_installer_leaves_state_alone() {
    let dir = tempfile::tempdir().unwrap();
    let policy = policy(dir.path());
    std::fs::write(dir.path().join("installer.lock"), "").unwrap();

    let mock = Arc::new(MockRunner::new());
    let store = Arc::new(PlistDeferralStore::new(dir.path().join("PatchgateDeferral.plist")));
    let controller = EnforcementController::new(&policy, mock.clone(), store.clone());

    let outcome = controller.run(noon()).await.unwrap();
    assert_eq!(outcome, Outcome::AbortedConcurrentInstallerRunning);
    assert!(mock.calls().is_empty());
    assert!(store.get().unwrap().is_none());
}

fn patchgate() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_patchgate"));
    command
        .env_remove("PATCHGATE_CONFIG")
        .env_remove("PATCHGATE_DATA_DIR")
        .env("RUST_LOG", "error")
        .arg("--no-audit");
    command
}

#[test]
fn binary_rejects_wrong_parameter_count() {
    let status = patchgate().args(["5", "22", "6"]).status().unwrap();
    assert_eq!(status.code(), Some(1));
}

#[test]
fn binary_rejects_non_integer_parameter() {
    let status = patchgate().args(["five", "22", "6", "20"]).status().unwrap();
    assert_eq!(status.code(), Some(1));
}

#[test]
fn binary_rejects_missing_explicit_settings_file() {
    let dir = tempfile::tempdir().unwrap();
    let status = patchgate()
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .args(["5", "22", "6", "20"])
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(1));
}
