//! Engine errors

use patchgate_host_api::{ExitStatus, HostError};
use patchgate_store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Host error: {0}")]
    Host(#[from] HostError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Update index {path:?}: {message}")]
    UpdateIndex { path: PathBuf, message: String },

    #[error("Command '{command}' failed with status {status:?}")]
    CommandFailed { command: String, status: ExitStatus },

    #[error("Failed to write {path:?}: {message}")]
    Write { path: PathBuf, message: String },

    #[error("A {limit_days} day deferral from now is not a representable date")]
    DeadlineOutOfRange { limit_days: u32 },
}

impl EngineError {
    /// True when the run must stop because a command ran out of time
    pub fn is_timeout(&self) -> bool {
        matches!(self, EngineError::Host(e) if e.is_timeout())
    }

    /// The command that timed out, if this is a timeout
    pub fn timed_out_command(&self) -> Option<&str> {
        match self {
            EngineError::Host(HostError::Timeout { command, .. }) => Some(command),
            _ => None,
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        EngineError::Write {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn timeout_survives_wrapping() {
        let err: EngineError = HostError::Timeout {
            command: "/usr/sbin/softwareupdate -i -r".into(),
            timeout: Duration::from_secs(3600),
        }
        .into();
        assert!(err.is_timeout());
        assert_eq!(err.timed_out_command(), Some("/usr/sbin/softwareupdate -i -r"));
    }

    #[test]
    fn other_errors_are_not_timeouts() {
        let err = EngineError::CommandFailed {
            command: "/sbin/reboot".into(),
            status: ExitStatus::with_code(1),
        };
        assert!(!err.is_timeout());
        assert_eq!(err.timed_out_command(), None);
    }
}
