//! Running native OS commands.

use crate::error::{Result, SystemError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::process::Command;

/// Default upper bound on a single native command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Executes a program and returns its standard output.
///
/// A nonzero exit status is an error carrying the command's stderr.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[&str]) -> Result<String>;
}

/// Runs commands on the host through `tokio::process`.
#[derive(Debug, Clone)]
pub struct SystemCommandRunner {
    timeout: Duration,
}

impl Default for SystemCommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

impl SystemCommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        let child = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                SystemError::command_error(program, format!("timed out after {:?}", self.timeout))
            })??;

        if !output.status.success() {
            return Err(SystemError::command_error(
                program,
                format!(
                    "exit status {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Replays fixed output per program name. Useful for exercising parsers without
/// the real tools installed.
#[derive(Debug, Default)]
pub struct CannedCommandRunner {
    outputs: HashMap<String, std::result::Result<String, String>>,
    calls: Mutex<Vec<String>>,
}

impl CannedCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `program` with `stdout`.
    pub fn with_output(mut self, program: impl Into<String>, stdout: impl Into<String>) -> Self {
        self.outputs.insert(program.into(), Ok(stdout.into()));
        self
    }

    /// Make `program` fail as if it exited nonzero.
    pub fn with_failure(mut self, program: impl Into<String>, stderr: impl Into<String>) -> Self {
        self.outputs.insert(program.into(), Err(stderr.into()));
        self
    }

    /// Command lines executed so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CommandRunner for CannedCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            let mut line = program.to_string();
            for arg in args {
                line.push(' ');
                line.push_str(arg);
            }
            calls.push(line);
        }

        match self.outputs.get(program) {
            Some(Ok(stdout)) => Ok(stdout.clone()),
            Some(Err(stderr)) => Err(SystemError::command_error(program, stderr.clone())),
            None => Err(SystemError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{program}: command not found"),
            ))),
        }
    }
}
