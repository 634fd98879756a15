//! Deadline-bounded command execution

use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use patchgate_host_api::{
    CommandOutput, CommandRunner, CommandSpec, ExitStatus, HostError, HostResult,
};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs commands on the real system
#[derive(Debug, Default, Clone)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec, timeout: Duration) -> HostResult<CommandOutput> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Own process group, so a timeout takes helpers down too
            .process_group(0)
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| HostError::SpawnFailed(format!("Failed to spawn {}: {}", spec, e)))?;
        let pid = child.id();

        debug!(pid = ?pid, command = %spec, timeout_secs = timeout.as_secs(), "Command started");

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
                combined.push_str(&String::from_utf8_lossy(&output.stderr));
                let status = convert_status(output.status);

                debug!(command = %spec, status = ?status, "Command finished");
                Ok(CommandOutput::new(combined, status))
            }
            Ok(Err(e)) => Err(HostError::Io(e)),
            Err(_) => {
                // The child itself is killed when its future is dropped
                if let Some(pid) = pid {
                    kill_process_group(pid);
                }
                warn!(command = %spec, timeout_secs = timeout.as_secs(), "Command timed out, killed");
                Err(HostError::Timeout {
                    command: spec.to_string(),
                    timeout,
                })
            }
        }
    }
}

fn kill_process_group(pgid: u32) {
    let pgid = Pid::from_raw(-(pgid as i32)); // Negative for process group

    match signal::kill(pgid, Signal::SIGKILL) {
        Ok(()) => debug!(pgid = pgid.as_raw(), "Sent SIGKILL to process group"),
        Err(nix::errno::Errno::ESRCH) => {
            // Process already gone
        }
        Err(e) => warn!(pgid = pgid.as_raw(), error = %e, "Failed to kill process group"),
    }
}

fn convert_status(status: std::process::ExitStatus) -> ExitStatus {
    if let Some(code) = status.code() {
        return ExitStatus::with_code(code);
    }

    use std::os::unix::process::ExitStatusExt;
    match status.signal() {
        Some(sig) => ExitStatus::signaled(sig),
        None => ExitStatus::with_code(-1),
    }
}
