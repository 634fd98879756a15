//! User prompts through the notification helper

use chrono::{DateTime, Local};
use patchgate_host_api::{CommandRunner, CommandSpec};
use patchgate_util::format_deadline;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::EngineResult;

/// Exit status of the helper when the second button is pressed
const DEFER_BUTTON_EXIT: i32 = 2;

/// Seconds the helper keeps its window up
const HELPER_WINDOW_TIMEOUT: &str = "99999";

pub struct UserPrompt {
    runner: Arc<dyn CommandRunner>,
    helper: PathBuf,
    icon: PathBuf,
    title: String,
    timeout: Duration,
}

impl UserPrompt {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        helper: PathBuf,
        icon: PathBuf,
        title: String,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            helper,
            icon,
            title,
            timeout,
        }
    }

    fn utility_window(&self, heading: &str, description: &str) -> CommandSpec {
        let icon = self.icon.to_string_lossy();
        CommandSpec::from_path(&self.helper).args([
            "-windowType",
            "utility",
            "-title",
            self.title.as_str(),
            "-heading",
            heading,
            "-icon",
            icon.as_ref(),
            "-timeout",
            HELPER_WINDOW_TIMEOUT,
            "-description",
            description,
        ])
    }

    /// Offer "Restart now" / "Restart later". Returns true if the user
    /// chose to defer.
    pub async fn user_wants_to_defer(
        &self,
        deadline: DateTime<Local>,
        updates: &str,
    ) -> EngineResult<bool> {
        let command = self
            .utility_window("Software Update Available", &defer_description(updates, &deadline))
            .args(["-button1", "Restart now", "-button2", "Restart later"]);

        let out = self.runner.run(&command, self.timeout).await?;

        if out.status.code == Some(DEFER_BUTTON_EXIT) {
            info!("User elected to defer update");
            Ok(true)
        } else {
            info!(status = ?out.status, "User permitted immediate update");
            Ok(false)
        }
    }

    /// Tell the user the deferral is used up. Only one button; returns when
    /// it is pressed.
    pub async fn notify_mandatory_restart(&self, updates: &str) -> EngineResult<()> {
        let command = self
            .utility_window("Mandatory Restart Required", &mandatory_description(updates))
            .args(["-button1", "Restart now"]);

        self.runner.run(&command, self.timeout).await?;
        info!("Mandatory restart acknowledged");
        Ok(())
    }
}

pub fn defer_description(updates: &str, deadline: &DateTime<Local>) -> String {
    format!(
        "One or more software updates require a restart:\n\n{}\n\nUpdates must be applied regularly.\n\nYou will be required to restart after:\n{}.",
        updates,
        format_deadline(deadline)
    )
}

pub fn mandatory_description(updates: &str) -> String {
    format!(
        "One or more updates which require a restart have been deferred for the maximum allowable time:\n\n{}\n\nA restart is now mandatory.\n\nPlease save your work and restart now to install the update.",
        updates
    )
}
