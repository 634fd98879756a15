//! Unattended install behind the login window

use patchgate_host_api::{CommandRunner, CommandSpec};
use patchgate_util::{LAUNCHCTL, REBOOT};
use plist::{Dictionary, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::{EngineError, EngineResult, UpdateInventory};

/// Full-screen notice shown at the login window while updates install
#[derive(Debug, Clone)]
pub struct LoginWindowNotice {
    /// Where the agent descriptor is written
    pub agent_path: PathBuf,
    pub helper: PathBuf,
    pub icon: PathBuf,
    pub heading: String,
    pub description: String,
}

impl LoginWindowNotice {
    /// Agent label, taken from the descriptor's file name
    pub fn label(&self) -> String {
        self.agent_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// The launchd descriptor for the notice
    pub fn descriptor(&self) -> Value {
        let program = [
            self.helper.to_string_lossy().into_owned(),
            "-windowType".to_string(),
            "fs".to_string(),
            "-heading".to_string(),
            self.heading.clone(),
            "-icon".to_string(),
            self.icon.to_string_lossy().into_owned(),
            "-description".to_string(),
            self.description.clone(),
        ];

        let mut agent = Dictionary::new();
        agent.insert("Label".to_string(), Value::String(self.label()));
        agent.insert("Disabled".to_string(), Value::Boolean(true));
        agent.insert(
            "LimitLoadToSessionType".to_string(),
            Value::Array(vec![Value::from("LoginWindow")]),
        );
        agent.insert("RunAtLoad".to_string(), Value::Boolean(true));
        agent.insert("KeepAlive".to_string(), Value::Boolean(true));
        agent.insert(
            "ProgramArguments".to_string(),
            Value::Array(program.into_iter().map(Value::String).collect()),
        );
        Value::Dictionary(agent)
    }
}

pub struct UnattendedInstaller {
    runner: Arc<dyn CommandRunner>,
    notice: LoginWindowNotice,
    timeout: Duration,
}

impl UnattendedInstaller {
    pub fn new(runner: Arc<dyn CommandRunner>, notice: LoginWindowNotice, timeout: Duration) -> Self {
        Self {
            runner,
            notice,
            timeout,
        }
    }

    /// (Re)write the agent descriptor
    pub fn write_login_window_agent(&self) -> EngineResult<()> {
        let path = &self.notice.agent_path;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EngineError::write(parent, e))?;
        }
        self.notice
            .descriptor()
            .to_file_xml(path)
            .map_err(|e| EngineError::write(path, e))?;
        info!(path = %path.display(), "Wrote login window agent");
        Ok(())
    }

    /// Cover the login window with the notice
    pub async fn lock_login_window(&self) -> EngineResult<()> {
        self.write_login_window_agent()?;

        let path = self.notice.agent_path.to_string_lossy();
        let command = CommandSpec::new(LAUNCHCTL).args(["load", "-F", "-S", "LoginWindow", path.as_ref()]);
        let out = self.runner.run(&command, self.timeout).await?;
        if !out.is_success() {
            return Err(EngineError::CommandFailed {
                command: command.to_string(),
                status: out.status,
            });
        }
        info!("Login window locked");
        Ok(())
    }

    /// Lock the login window, then install everything recommended.
    /// Returns whether the install reported success.
    pub async fn lock_login_screen_and_install(&self, inventory: &UpdateInventory) -> EngineResult<bool> {
        self.lock_login_window().await?;
        let installed = inventory.install_recommended().await?;
        if !installed {
            warn!("Install failed behind the login window, rebooting anyway");
        }
        Ok(installed)
    }

    /// Restart without asking anyone
    pub async fn reboot(&self) -> EngineResult<()> {
        info!("Rebooting");
        let command = CommandSpec::new(REBOOT);
        let out = self.runner.run(&command, self.timeout).await?;
        if !out.is_success() {
            return Err(EngineError::CommandFailed {
                command: command.to_string(),
                status: out.status,
            });
        }
        Ok(())
    }
}
