//! Session observer
//!
//! Two independent probes decide whether anybody is using the machine:
//! the owner of the console device and the `w` session listing. Neither is
//! trusted alone. SSH sessions never own the console, and a headless
//! console can keep reporting a stale owner.

use patchgate_api::SessionState;
use patchgate_host_api::{CommandRunner, CommandSpec};
use patchgate_util::{STAT, W};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::EngineResult;

/// `w` prints this many header lines before any session
const SESSION_LISTING_HEADER_LINES: usize = 2;

pub struct SessionObserver {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
    console_sentinels: Vec<String>,
}

impl SessionObserver {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        timeout: Duration,
        console_sentinels: Vec<String>,
    ) -> Self {
        Self {
            runner,
            timeout,
            console_sentinels,
        }
    }

    /// The user logged into the local graphical session, if any
    pub async fn console_user(&self) -> EngineResult<Option<String>> {
        let out = self
            .runner
            .run(
                &CommandSpec::new(STAT).args(["-f", "%Su", "/dev/console"]),
                self.timeout,
            )
            .await?;

        if !out.is_success() {
            warn!(status = ?out.status, "Could not read console owner");
            return Ok(None);
        }

        Ok(normalize_console_user(&out.output, &self.console_sentinels))
    }

    /// Number of lines in the session listing. `None` if `w` failed.
    async fn session_listing_lines(&self) -> EngineResult<Option<usize>> {
        let out = self.runner.run(&CommandSpec::new(W), self.timeout).await?;

        if !out.is_success() {
            warn!(status = ?out.status, "Session listing failed");
            return Ok(None);
        }

        Ok(Some(count_listing_lines(&out.output)))
    }

    /// True only if the session listing shows nobody and nobody owns the
    /// console.
    pub async fn nobody_logged_in(&self) -> EngineResult<bool> {
        Ok(self.observe().await?.nobody_logged_in())
    }

    pub async fn observe(&self) -> EngineResult<SessionState> {
        if let Some(username) = self.console_user().await? {
            info!(user = %username, "Console user present");
            return Ok(SessionState::LocalConsoleUser { username });
        }

        let state = match self.session_listing_lines().await? {
            Some(lines) if lines <= SESSION_LISTING_HEADER_LINES => SessionState::NoConsoleUser,
            Some(lines) => {
                debug!(lines, "Session listing shows other sessions");
                SessionState::AmbiguousRemotePresence
            }
            // Can't tell, so assume somebody is there
            None => SessionState::AmbiguousRemotePresence,
        };

        info!(state = ?state, "No console user");
        Ok(state)
    }
}

/// Trim the console owner and map login-window sentinels to `None`
pub fn normalize_console_user(raw: &str, sentinels: &[String]) -> Option<String> {
    let name = raw.trim();
    if name.is_empty() || sentinels.iter().any(|s| s == name) {
        None
    } else {
        Some(name.to_string())
    }
}

pub fn count_listing_lines(output: &str) -> usize {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        0
    } else {
        trimmed.lines().count()
    }
}
