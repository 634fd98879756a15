//! Install-at-logout staging and logout requests
//!
//! The update daemon installs staged products during logout when three
//! things line up: the index lists them under `InstallAtLogout`, the
//! options record asks for a non-interactive root install, and the trigger
//! file exists.

use patchgate_host_api::{CommandRunner, CommandSpec};
use patchgate_util::{KILLALL, OSASCRIPT, SUDO};
use plist::{Dictionary, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{EngineError, EngineResult};

/// Daemons that must re-read state after the trigger is armed
pub const SOFTWARE_UPDATE_PROCESSES: [&str; 4] = [
    "softwareupdated",
    "swhelperd",
    "softwareupdate_notify_agent",
    "softwareupdate_download_service",
];

const PRODUCT_PATHS_KEY: &str = "ProductPaths";
const INSTALL_AT_LOGOUT_KEY: &str = "InstallAtLogout";

const LOGOUT_EVENT: &str = "tell application \"loginwindow\" to «event aevtrlgo»";

/// Where the staging files live
#[derive(Debug, Clone)]
pub struct LogoutFiles {
    pub update_index: PathBuf,
    pub options_file: PathBuf,
    pub trigger_file: PathBuf,
}

pub struct LogoutOrchestrator {
    runner: Arc<dyn CommandRunner>,
    files: LogoutFiles,
    timeout: Duration,
    settle: Duration,
}

impl LogoutOrchestrator {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        files: LogoutFiles,
        timeout: Duration,
        settle: Duration,
    ) -> Self {
        Self {
            runner,
            files,
            timeout,
            settle,
        }
    }

    /// Mark every downloaded product to install at the next logout.
    /// Returns the number of products staged.
    pub fn prepare_index_for_logout_install(&self) -> EngineResult<usize> {
        let path = &self.files.update_index;
        info!(path = %path.display(), "Setting up the updates index file");

        let mut index = Value::from_file(path).map_err(|e| index_error(path, e))?;
        let dict = index
            .as_dictionary_mut()
            .ok_or_else(|| index_error(path, "top level is not a dictionary"))?;

        let products: Vec<Value> = dict
            .get(PRODUCT_PATHS_KEY)
            .and_then(Value::as_dictionary)
            .ok_or_else(|| index_error(path, "no ProductPaths dictionary"))?
            .keys()
            .map(|product| {
                info!(product = %product, "Setting up product to install at logout");
                Value::String(product.clone())
            })
            .collect();

        let count = products.len();
        dict.insert(INSTALL_AT_LOGOUT_KEY.to_string(), Value::Array(products));

        index
            .to_file_xml(path)
            .map_err(|e| EngineError::write(path, e))?;
        Ok(count)
    }

    /// Write the options record, touch the trigger and poke the update
    /// daemons.
    pub async fn arm_logout_trigger(&self) -> EngineResult<()> {
        info!("Setting updates to run on logout");

        let mut options = Dictionary::new();
        options.insert("-RootInstallMode".to_string(), Value::from("YES"));
        options.insert("-SkipConfirm".to_string(), Value::from("YES"));
        Value::Dictionary(options)
            .to_file_xml(&self.files.options_file)
            .map_err(|e| EngineError::write(&self.files.options_file, e))?;

        std::fs::File::create(&self.files.trigger_file)
            .map_err(|e| EngineError::write(&self.files.trigger_file, e))?;

        for process in SOFTWARE_UPDATE_PROCESSES {
            let out = self
                .runner
                .run(
                    &CommandSpec::new(KILLALL).args(["-HUP", process]),
                    self.timeout,
                )
                .await?;
            // Not every daemon is running at all times
            debug!(process, status = ?out.status, "Sent SIGHUP");
        }

        tokio::time::sleep(self.settle).await;
        Ok(())
    }

    /// Ask the user's session manager for a normal logout
    pub async fn force_logout(&self, username: &str) -> EngineResult<()> {
        info!(user = %username, "Requesting logout");

        let command = CommandSpec::new(SUDO).args(["-u", username, OSASCRIPT, "-e", LOGOUT_EVENT]);
        let out = self.runner.run(&command, self.timeout).await?;

        if !out.is_success() {
            warn!(user = %username, status = ?out.status, output = %out.output.trim(), "Logout request failed");
        }
        Ok(())
    }
}

fn index_error(path: &Path, err: impl std::fmt::Display) -> EngineError {
    EngineError::UpdateIndex {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
