//! Update inventory
//!
//! Wraps the platform update tool. All knowledge of its text output lives
//! in [`parse_update_list`].

use patchgate_api::{Update, UpdateSet};
use patchgate_host_api::{CommandRunner, CommandSpec};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{EngineError, EngineResult};

/// Printed when the catalog has nothing for this machine
pub const NO_UPDATES_MARKER: &str = "No new software available.";

/// Printed when the update server is unreachable
pub const NO_NETWORK_MARKER: &str = "Can't connect to the Apple Software Update server, because you are not connected to the Internet.";

const RESTART_MARKER: &str = "[restart]";
const RECOMMENDED_MARKER: &str = "[recommended]";
const ACTION_RESTART_MARKER: &str = "Action: restart";
const TITLE_PREFIX: &str = "Title:";

/// Time budgets for the three update tool modes
#[derive(Debug, Clone, Copy)]
pub struct InventoryTimeouts {
    pub check: Duration,
    pub download: Duration,
    pub install: Duration,
}

pub struct UpdateInventory {
    runner: Arc<dyn CommandRunner>,
    tool: PathBuf,
    timeouts: InventoryTimeouts,
}

impl UpdateInventory {
    pub fn new(runner: Arc<dyn CommandRunner>, tool: PathBuf, timeouts: InventoryTimeouts) -> Self {
        Self {
            runner,
            tool,
            timeouts,
        }
    }

    fn command(&self, mode: &str) -> CommandSpec {
        CommandSpec::from_path(&self.tool).args([mode, "-r"])
    }

    /// List recommended updates
    pub async fn check_for_updates(&self) -> EngineResult<UpdateSet> {
        info!("Checking for updates");
        let out = self
            .runner
            .run(&self.command("-l"), self.timeouts.check)
            .await?;

        if !out.is_success() {
            debug!(status = ?out.status, "Update listing exited non-zero");
        }

        let set = parse_update_list(&out.output);
        info!(
            available = set.any_updates_available(),
            network_unavailable = set.is_network_unavailable(),
            count = set.updates().len(),
            restart_required = set.restart_required(),
            "Update check complete"
        );
        Ok(set)
    }

    /// Download without installing. Must succeed before any install step.
    pub async fn download(&self) -> EngineResult<()> {
        info!("Downloading updates");
        let command = self.command("-d");
        let out = self.runner.run(&command, self.timeouts.download).await?;

        if !out.is_success() {
            return Err(EngineError::CommandFailed {
                command: command.to_string(),
                status: out.status,
            });
        }
        Ok(())
    }

    /// Install every recommended update.
    ///
    /// A failed install is left for the next run to retry.
    pub async fn install_recommended(&self) -> EngineResult<bool> {
        info!("Installing recommended updates");
        let out = self
            .runner
            .run(&self.command("-i"), self.timeouts.install)
            .await?;

        if !out.is_success() {
            warn!(status = ?out.status, output = %out.output.trim(), "Install reported failure");
        }
        Ok(out.is_success())
    }
}

/// Classify the update tool's listing.
///
/// Recognises both listing styles:
///
/// ```text
/// * Security Update 2019-001-10.13.6
///     Security Update 2019 (10.13.6), 1898600K [recommended] [restart]
///
/// * Label: Safari15.1CatalinaAuto-15.1
///     Title: Safari, Version: 15.1, Size: 78183K, Recommended: YES,
/// ```
pub fn parse_update_list(output: &str) -> UpdateSet {
    if output.lines().any(|l| l.contains(NO_NETWORK_MARKER)) {
        return UpdateSet::network_unavailable();
    }
    if output.lines().any(|l| l.contains(NO_UPDATES_MARKER)) {
        return UpdateSet::none();
    }

    let updates = output
        .lines()
        .map(str::trim)
        .filter(|line| is_detail_line(line))
        .map(|line| Update::new(update_name(line), requires_restart(line)))
        .collect();

    UpdateSet::available(updates)
}

fn is_detail_line(line: &str) -> bool {
    !line.starts_with('*')
        && (line.contains(RECOMMENDED_MARKER)
            || line.contains(RESTART_MARKER)
            || line.starts_with(TITLE_PREFIX))
}

fn requires_restart(line: &str) -> bool {
    line.contains(RESTART_MARKER) || line.contains(ACTION_RESTART_MARKER)
}

/// First comma-delimited field, without any `Title:` prefix
fn update_name(line: &str) -> &str {
    let first = line.split(',').next().unwrap_or(line);
    first
        .strip_prefix(TITLE_PREFIX)
        .unwrap_or(first)
        .trim()
}
