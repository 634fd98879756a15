//! The enforcement state machine
//!
//! One invocation walks from the update check to exactly one terminal
//! [`Outcome`]. Every external call is bounded; a timeout anywhere ends the
//! run as [`Outcome::AbortedTimeout`] with no compensation.

use chrono::{DateTime, Local};
use patchgate_api::{DeferralStatus, Outcome, SessionState, UpdateSet};
use patchgate_config::{Policy, Thresholds};
use patchgate_host_api::CommandRunner;
use patchgate_store::DeferralStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    DeferralLedger, EngineResult, InventoryTimeouts, LoginWindowNotice, LogoutFiles,
    LogoutOrchestrator, PowerGate, SessionObserver, UnattendedInstaller, UpdateInventory,
    UserPrompt,
};

pub struct EnforcementController {
    thresholds: Thresholds,
    installer_lock: PathBuf,
    inventory: UpdateInventory,
    ledger: DeferralLedger,
    session: SessionObserver,
    power: PowerGate,
    prompt: UserPrompt,
    logout: LogoutOrchestrator,
    unattended: UnattendedInstaller,
}

impl EnforcementController {
    pub fn new(
        policy: &Policy,
        runner: Arc<dyn CommandRunner>,
        deferrals: Arc<dyn DeferralStore>,
    ) -> Self {
        let settings = &policy.settings;
        let paths = &settings.paths;
        let timeouts = &settings.timeouts;

        info!(
            defer_limit_days = policy.thresholds.defer_limit_days,
            quiet_hours = %policy.thresholds.quiet_hours,
            min_battery_percent = policy.thresholds.min_battery_percent,
            "Enforcement controller initialized"
        );

        Self {
            thresholds: policy.thresholds,
            installer_lock: paths.installer_lock.clone(),
            inventory: UpdateInventory::new(
                runner.clone(),
                paths.update_tool.clone(),
                InventoryTimeouts {
                    check: timeouts.check,
                    download: timeouts.download,
                    install: timeouts.install,
                },
            ),
            ledger: DeferralLedger::new(deferrals),
            session: SessionObserver::new(
                runner.clone(),
                timeouts.probe,
                settings.session.console_sentinels.clone(),
            ),
            power: PowerGate::new(runner.clone(), timeouts.probe),
            prompt: UserPrompt::new(
                runner.clone(),
                paths.prompt_helper.clone(),
                paths.icon.clone(),
                settings.prompt.title.clone(),
                timeouts.prompt,
            ),
            logout: LogoutOrchestrator::new(
                runner.clone(),
                LogoutFiles {
                    update_index: paths.update_index.clone(),
                    options_file: paths.options_file.clone(),
                    trigger_file: paths.trigger_file.clone(),
                },
                timeouts.probe,
                timeouts.settle,
            ),
            unattended: UnattendedInstaller::new(
                runner,
                LoginWindowNotice {
                    agent_path: paths.login_window_agent.clone(),
                    helper: paths.prompt_helper.clone(),
                    icon: paths.icon.clone(),
                    heading: settings.prompt.login_window_heading.clone(),
                    description: settings.prompt.login_window_description.clone(),
                },
                timeouts.probe,
            ),
        }
    }

    /// Another install mechanism is active
    pub fn installer_lock_held(&self) -> bool {
        self.installer_lock.exists()
    }

    /// Run once and report where it ended.
    ///
    /// Errors other than timeouts (unwritable files, a failed download or
    /// service load) are returned to the caller.
    pub async fn run(&self, now: DateTime<Local>) -> EngineResult<Outcome> {
        if self.installer_lock_held() {
            info!(lock = %self.installer_lock.display(), "Another installer is running, exiting");
            return Ok(Outcome::AbortedConcurrentInstallerRunning);
        }

        match self.enforce(now).await {
            Err(e) if e.is_timeout() => {
                let command = e.timed_out_command().unwrap_or_default().to_string();
                warn!(command = %command, "Command timed out, aborting run");
                Ok(Outcome::AbortedTimeout { command })
            }
            result => result,
        }
    }

    async fn enforce(&self, now: DateTime<Local>) -> EngineResult<Outcome> {
        let updates = self.inventory.check_for_updates().await?;

        if !updates.any_updates_available() {
            info!("No updates available");
            self.ledger.clear()?;
            return Ok(Outcome::NoUpdates {
                network_unavailable: updates.is_network_unavailable(),
            });
        }

        self.inventory.download().await?;

        if !updates.restart_required() {
            info!("No restart required, installing in the background");
            let installed = if self.inventory.install_recommended().await? {
                updates.updates().len()
            } else {
                0
            };
            self.ledger.clear()?;
            return Ok(Outcome::NoRestartRequired { installed });
        }

        match self.session.observe().await? {
            SessionState::LocalConsoleUser { username } => {
                self.enforce_with_user(username, &updates, now).await
            }
            session => self.enforce_without_user(session, now).await,
        }
    }

    async fn enforce_with_user(
        &self,
        username: String,
        updates: &UpdateSet,
        now: DateTime<Local>,
    ) -> EngineResult<Outcome> {
        let list = updates.printable_list();

        match self
            .ledger
            .deferral_ok_until(self.thresholds.defer_limit_days, now)?
        {
            DeferralStatus::AllowedUntil { deadline } => {
                if self.prompt.user_wants_to_defer(deadline, &list).await? {
                    return Ok(Outcome::DeferGranted { username, deadline });
                }

                self.stage_logout_install().await?;
                self.ledger.clear()?;
                self.logout.force_logout(&username).await?;
                Ok(Outcome::ForceLogout {
                    username,
                    deferral_exhausted: false,
                })
            }
            DeferralStatus::NotAllowed { expired_at } => {
                info!(expired_at = %expired_at, "Deferral exhausted, restart is mandatory");

                self.stage_logout_install().await?;
                self.prompt.notify_mandatory_restart(&list).await?;
                self.ledger.clear()?;
                self.logout.force_logout(&username).await?;
                Ok(Outcome::ForceLogout {
                    username,
                    deferral_exhausted: true,
                })
            }
        }
    }

    async fn enforce_without_user(
        &self,
        session: SessionState,
        now: DateTime<Local>,
    ) -> EngineResult<Outcome> {
        let in_quiet_hours = self.thresholds.quiet_hours.contains(&now);

        if !session.nobody_logged_in() || !in_quiet_hours {
            info!(
                session = ?session,
                in_quiet_hours,
                quiet_hours = %self.thresholds.quiet_hours,
                "Restart required but not safe to install now"
            );
            return Ok(Outcome::RestartRequiredNoSession {
                session,
                in_quiet_hours,
            });
        }

        let power = self.power.read_state().await?;
        if !power.safe_for_unattended_install(self.thresholds.min_battery_percent) {
            warn!(
                on_ac_power = power.on_ac_power,
                battery_percent = ?power.battery_percent,
                min_battery_percent = self.thresholds.min_battery_percent,
                "Power not safe for an unattended install"
            );
            return Ok(Outcome::SkippedUnsafe { power });
        }

        info!("Nobody logged in during quiet hours, installing at the login window");
        self.unattended
            .lock_login_screen_and_install(&self.inventory)
            .await?;

        // The reboot must happen even if the record can't be removed
        if let Err(e) = self.ledger.clear() {
            warn!(error = %e, "Failed to clear deferral record");
        }
        self.unattended.reboot().await?;
        Ok(Outcome::UnattendedInstall)
    }

    async fn stage_logout_install(&self) -> EngineResult<()> {
        let staged = self.logout.prepare_index_for_logout_install()?;
        info!(staged, "Products staged for install at logout");
        self.logout.arm_logout_trigger().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use patchgate_api::PowerState;
    use patchgate_config::Settings;
    use crate::EngineError;
    use patchgate_host_api::{HostError, MockResponse, MockRunner};
    use patchgate_store::{DeferralRecord, MemoryDeferralStore};
    use patchgate_util::QuietHours;
    use plist::{Dictionary, Value};
    use std::time::Duration;
    use tempfile::TempDir;

    const TOOL: &str = "/usr/sbin/softwareupdate";
    const HELPER: &str = "/opt/helper";

    const RESTART_LISTING: &str = "Software Update found the following new or updated software:\n   * SecUpd2019-001-10.13.6\n\tSecurity Update 2019-001 (10.13.6), 1898600K [recommended] [restart]\n";
    const QUIET_LISTING: &str = "Software Update found the following new or updated software:\n   * iTunesX-12.6.1\n\tiTunes (12.6.1), 267835K [recommended]\n";

    struct Fixture {
        dir: TempDir,
        mock: Arc<MockRunner>,
        store: Arc<MemoryDeferralStore>,
        policy: Policy,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_store(MemoryDeferralStore::new())
        }

        fn with_store(store: MemoryDeferralStore) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path();

            let mut settings = Settings::default();
            settings.paths.update_tool = PathBuf::from(TOOL);
            settings.paths.prompt_helper = PathBuf::from(HELPER);
            settings.paths.update_index = root.join("index.plist");
            settings.paths.trigger_file = root.join(".AppleLaunchSoftwareUpdate");
            settings.paths.options_file = root.join(".SoftwareUpdateOptions");
            settings.paths.deferral_file = root.join("deferral.plist");
            settings.paths.installer_lock = root.join("installer.lock");
            settings.paths.login_window_agent = root.join("agent.plist");
            settings.paths.data_dir = root.join("data");
            settings.timeouts.settle = Duration::ZERO;

            let mut products = Dictionary::new();
            products.insert("041-12345".into(), Value::from("041-12345/SecUpd.pkg"));
            let mut index = Dictionary::new();
            index.insert("ProductPaths".into(), Value::Dictionary(products));
            Value::Dictionary(index)
                .to_file_xml(&settings.paths.update_index)
                .unwrap();

            Self {
                dir,
                mock: Arc::new(MockRunner::new()),
                store: Arc::new(store),
                policy: Policy {
                    thresholds: Thresholds {
                        defer_limit_days: 5,
                        quiet_hours: QuietHours::new(22, 6).unwrap(),
                        min_battery_percent: 20,
                    },
                    settings,
                },
            }
        }

        fn controller(&self) -> EnforcementController {
            EnforcementController::new(&self.policy, self.mock.clone(), self.store.clone())
        }

        fn console_user(&self, name: &str) -> &Self {
            self.mock.on("/usr/bin/stat -f %Su /dev/console", name);
            self
        }

        fn listing(&self, listing: &str) -> &Self {
            self.mock.on(format!("{} -l -r", TOOL), listing);
            self
        }

        fn laptop(&self, pmset: &str) -> &Self {
            self.mock
                .on("/usr/sbin/sysctl hw.model", "hw.model: MacBookPro16,1")
                .on("/usr/bin/pmset -g batt", pmset.to_string());
            self
        }

        fn trigger_armed(&self) -> bool {
            self.dir.path().join(".AppleLaunchSoftwareUpdate").exists()
        }
    }

    fn at(hour: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 12, hour, 30, 0).single().unwrap()
    }

    fn existing(deadline: DateTime<Local>) -> MemoryDeferralStore {
        MemoryDeferralStore::with_record(DeferralRecord::new(deadline))
    }

    /// A deadline granted earlier that is still running
    fn pending_deadline() -> DateTime<Local> {
        at(12) + chrono::Duration::days(3)
    }

    #[tokio::test]
    async fn installer_lock_stops_everything() {
        let f = Fixture::new();
        std::fs::write(f.dir.path().join("installer.lock"), "").unwrap();

        let outcome = f.controller().run(at(12)).await.unwrap();
        assert_eq!(outcome, Outcome::AbortedConcurrentInstallerRunning);
        assert!(f.mock.calls().is_empty());
    }

    #[tokio::test]
    async fn no_updates_clears_ledger() {
        let f = Fixture::with_store(existing(at(12)));
        f.listing("No new software available.\n");

        let outcome = f.controller().run(at(12)).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::NoUpdates {
                network_unavailable: false
            }
        );
        assert_eq!(outcome.exit_code(), 0);
        assert!(f.store.peek().is_none());
        assert!(!f.mock.was_called(HELPER));
        assert!(!f.mock.was_called("/usr/sbin/softwareupdate -d"));
    }

    #[tokio::test]
    async fn updates_without_restart_install_silently() {
        let f = Fixture::with_store(existing(at(12)));
        f.listing(QUIET_LISTING);

        let outcome = f.controller().run(at(12)).await.unwrap();
        assert_eq!(outcome, Outcome::NoRestartRequired { installed: 1 });
        assert!(f.mock.was_called("/usr/sbin/softwareupdate -d -r"));
        assert!(f.mock.was_called("/usr/sbin/softwareupdate -i -r"));
        assert!(f.store.peek().is_none());
        assert!(!f.mock.was_called(HELPER));
    }

    #[tokio::test]
    async fn user_defers_with_fresh_deadline() {
        let f = Fixture::new();
        f.listing(RESTART_LISTING).console_user("alice");
        f.mock.on_exit(HELPER, "", 2);

        let now = at(12);
        let outcome = f.controller().run(now).await.unwrap();

        let deadline = now + chrono::Duration::days(5);
        assert_eq!(
            outcome,
            Outcome::DeferGranted {
                username: "alice".into(),
                deadline
            }
        );
        assert_eq!(f.store.peek().unwrap().defer_ok_until, deadline);
        assert_eq!(f.mock.count(HELPER), 1);
        assert!(!f.mock.was_called("/usr/sbin/softwareupdate -i"));
        assert!(!f.trigger_armed());
    }

    #[tokio::test]
    async fn repeated_deferral_keeps_deadline() {
        let f = Fixture::new();
        f.listing(RESTART_LISTING).console_user("alice");
        f.mock.on_exit(HELPER, "", 2);

        let controller = f.controller();
        controller.run(at(9)).await.unwrap();
        let first = f.store.peek().unwrap();
        controller.run(at(15)).await.unwrap();
        assert_eq!(f.store.peek().unwrap(), first);
    }

    #[tokio::test]
    async fn user_accepts_restart() {
        let f = Fixture::new();
        f.listing(RESTART_LISTING).console_user("alice");

        let outcome = f.controller().run(at(12)).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::ForceLogout {
                username: "alice".into(),
                deferral_exhausted: false
            }
        );
        assert!(f.trigger_armed());
        assert!(f.store.peek().is_none());
        assert!(f.mock.was_called("/usr/bin/sudo -u alice"));
    }

    #[tokio::test]
    async fn exhausted_deferral_forces_logout() {
        let now = at(12);
        let f = Fixture::with_store(existing(now - chrono::Duration::hours(1)));
        f.listing(RESTART_LISTING).console_user("alice");

        let outcome = f.controller().run(now).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::ForceLogout {
                username: "alice".into(),
                deferral_exhausted: true
            }
        );

        // Only the mandatory prompt, after staging and before logout
        let calls = f.mock.calls();
        let prompt = calls.iter().position(|c| c.starts_with(HELPER)).unwrap();
        assert!(calls[prompt].contains("Mandatory Restart Required"));
        assert!(!calls[prompt].contains("Restart later"));
        assert_eq!(f.mock.count(HELPER), 1);
        let hup = calls.iter().position(|c| c.starts_with("/usr/bin/killall")).unwrap();
        let logout = calls.iter().position(|c| c.starts_with("/usr/bin/sudo")).unwrap();
        assert!(hup < prompt && prompt < logout);

        assert!(f.trigger_armed());
        let index = Value::from_file(f.dir.path().join("index.plist")).unwrap();
        assert!(index.as_dictionary().unwrap().get("InstallAtLogout").is_some());
    }

    #[tokio::test]
    async fn unattended_install_in_quiet_hours() {
        let f = Fixture::with_store(existing(pending_deadline()));
        f.listing(RESTART_LISTING).laptop(
            "Now drawing from 'AC Power'\n -InternalBattery-0 (id=4653155)\t80%; charging; 1:20 remaining present: true\n",
        );

        let outcome = f.controller().run(at(23)).await.unwrap();
        assert_eq!(outcome, Outcome::UnattendedInstall);

        let calls = f.mock.calls();
        let lock = calls.iter().position(|c| c.starts_with("/bin/launchctl load")).unwrap();
        let install = calls.iter().position(|c| c == "/usr/sbin/softwareupdate -i -r").unwrap();
        let reboot = calls.iter().position(|c| c == "/sbin/reboot").unwrap();
        assert!(lock < install && install < reboot);
        assert!(f.dir.path().join("agent.plist").exists());
        assert!(f.store.peek().is_none());
    }

    #[tokio::test]
    async fn desktop_without_battery_installs_unattended() {
        let f = Fixture::with_store(existing(pending_deadline()));
        f.listing(RESTART_LISTING);
        f.mock
            .on("/usr/sbin/sysctl hw.model", "hw.model: iMac19,1")
            .on("/usr/bin/pmset -g batt", "Now drawing from 'AC Power'\n");

        let outcome = f.controller().run(at(2)).await.unwrap();
        assert_eq!(outcome, Outcome::UnattendedInstall);
        assert!(f.mock.was_called("/usr/sbin/softwareupdate -i -r"));
        assert!(f.mock.was_called("/sbin/reboot"));
        assert!(f.store.peek().is_none());
    }

    #[tokio::test]
    async fn low_battery_skips_unattended_install() {
        let f = Fixture::with_store(existing(pending_deadline()));
        f.listing(RESTART_LISTING).laptop(
            "Now drawing from 'AC Power'\n -InternalBattery-0 (id=4653155)\t10%; charging; 3:20 remaining present: true\n",
        );

        let outcome = f.controller().run(at(23)).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::SkippedUnsafe {
                power: PowerState {
                    is_portable: true,
                    on_ac_power: true,
                    battery_percent: Some(10),
                }
            }
        );
        assert!(!f.mock.was_called("/usr/sbin/softwareupdate -i"));
        assert!(!f.mock.was_called("/bin/launchctl"));
        assert!(!f.mock.was_called("/sbin/reboot"));
        assert_eq!(f.store.peek().unwrap().defer_ok_until, pending_deadline());
    }

    #[tokio::test]
    async fn outside_quiet_hours_does_nothing() {
        let f = Fixture::with_store(existing(pending_deadline()));
        f.listing(RESTART_LISTING);

        let outcome = f.controller().run(at(12)).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::RestartRequiredNoSession {
                session: SessionState::NoConsoleUser,
                in_quiet_hours: false
            }
        );
        assert!(!f.mock.was_called("/usr/bin/pmset"));
        assert_eq!(f.store.peek().unwrap().defer_ok_until, pending_deadline());
    }

    #[tokio::test]
    async fn remote_session_blocks_unattended_install() {
        let f = Fixture::with_store(existing(pending_deadline()));
        f.listing(RESTART_LISTING);
        f.mock.on(
            "/usr/bin/w",
            "23:30  up 2 days, 3 users\nUSER     TTY      FROM    LOGIN@  IDLE WHAT\nbob      s000     10.0.0.2 23:01      - -zsh\n",
        );

        let outcome = f.controller().run(at(23)).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::RestartRequiredNoSession {
                session: SessionState::AmbiguousRemotePresence,
                in_quiet_hours: true
            }
        );
        assert!(!f.mock.was_called("/usr/sbin/softwareupdate -i"));
        assert_eq!(f.store.peek().unwrap().defer_ok_until, pending_deadline());
    }

    #[tokio::test]
    async fn missing_session_tool_fails_the_run() {
        let f = Fixture::with_store(existing(pending_deadline()));
        f.listing(RESTART_LISTING);
        f.mock.respond("/usr/bin/w", MockResponse::SpawnFailure);

        let err = f.controller().run(at(23)).await.unwrap_err();
        assert!(matches!(err, EngineError::Host(HostError::SpawnFailed(_))));
        assert!(!err.is_timeout());
        assert!(!f.mock.was_called("/usr/bin/pmset"));
        assert!(!f.mock.was_called("/usr/sbin/softwareupdate -i"));
        assert_eq!(f.store.peek().unwrap().defer_ok_until, pending_deadline());
    }

    #[tokio::test]
    async fn timeout_aborts_run() {
        let f = Fixture::new();
        f.listing(RESTART_LISTING).console_user("alice");
        f.mock.on_timeout(HELPER);

        let outcome = f.controller().run(at(12)).await.unwrap();
        assert!(matches!(outcome, Outcome::AbortedTimeout { ref command } if command.starts_with(HELPER)));
        assert_eq!(outcome.exit_code(), 255);
        assert!(!f.trigger_armed());
    }

    #[tokio::test]
    async fn failed_download_is_an_error() {
        let f = Fixture::new();
        f.listing(QUIET_LISTING);
        f.mock.on_exit("/usr/sbin/softwareupdate -d -r", "Error", 1);

        assert!(f.controller().run(at(12)).await.is_err());
        assert!(!f.mock.was_called("/usr/sbin/softwareupdate -i"));
    }
}
