//! Host runner trait

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::{CommandOutput, CommandSpec};

/// Errors from running external commands
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    /// The command ran past its deadline and was killed. Aborts the whole run.
    #[error("Command '{command}' timed out after {}s", timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HostError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, HostError::Timeout { .. })
    }
}

pub type HostResult<T> = Result<T, HostError>;

/// Runs external commands under a hard wall-clock deadline.
///
/// Implementations must kill the command when the deadline passes and
/// return [`HostError::Timeout`]. A non-zero exit is not an error; callers
/// inspect [`CommandOutput::status`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &CommandSpec, timeout: Duration) -> HostResult<CommandOutput>;
}
