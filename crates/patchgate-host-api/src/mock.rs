//! Mock command runner for testing

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::{CommandOutput, CommandRunner, CommandSpec, ExitStatus, HostError, HostResult};

/// Scripted reply to a command
#[derive(Debug, Clone)]
pub enum MockResponse {
    Output(CommandOutput),
    Timeout,
    SpawnFailure,
}

/// Mock runner for unit/integration testing.
///
/// Responses are looked up by the full command line first, then by the
/// program alone. Unscripted commands succeed with empty output. Every
/// invocation is recorded.
#[derive(Default)]
pub struct MockRunner {
    responses: Mutex<HashMap<String, MockResponse>>,
    calls: Mutex<Vec<(CommandSpec, Duration)>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to `key` with `output` and exit code 0
    pub fn on(&self, key: impl Into<String>, output: impl Into<String>) -> &Self {
        self.respond(key, MockResponse::Output(CommandOutput::success(output)))
    }

    /// Reply to `key` with `output` and the given exit code
    pub fn on_exit(&self, key: impl Into<String>, output: impl Into<String>, code: i32) -> &Self {
        self.respond(
            key,
            MockResponse::Output(CommandOutput::new(output, ExitStatus::with_code(code))),
        )
    }

    /// Make `key` run past its deadline
    pub fn on_timeout(&self, key: impl Into<String>) -> &Self {
        self.respond(key, MockResponse::Timeout)
    }

    pub fn respond(&self, key: impl Into<String>, response: MockResponse) -> &Self {
        self.responses.lock().unwrap().insert(key.into(), response);
        self
    }

    /// Command lines run so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(spec, _)| spec.to_string())
            .collect()
    }

    /// Deadline the most recent matching command was given
    pub fn timeout_for(&self, prefix: &str) -> Option<Duration> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(spec, _)| spec.to_string().starts_with(prefix))
            .map(|(_, timeout)| *timeout)
    }

    /// Whether any recorded command line starts with `prefix`
    pub fn was_called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }

    /// Number of recorded command lines starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn lookup(&self, command: &CommandSpec) -> Option<MockResponse> {
        let responses = self.responses.lock().unwrap();
        responses
            .get(&command.to_string())
            .or_else(|| responses.get(&command.program))
            .cloned()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, command: &CommandSpec, timeout: Duration) -> HostResult<CommandOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((command.clone(), timeout));

        match self.lookup(command) {
            Some(MockResponse::Output(output)) => Ok(output),
            Some(MockResponse::Timeout) => Err(HostError::Timeout {
                command: command.to_string(),
                timeout,
            }),
            Some(MockResponse::SpawnFailure) => {
                Err(HostError::SpawnFailed(format!("Mock spawn failure: {}", command)))
            }
            None => Ok(CommandOutput::success("")),
        }
    }
}
