//! Subprocess command runner.
//!
//! Spawns the invocation's argv directly (no shell) with `tokio::process`,
//! captures stdout and stderr, and enforces an optional per-command timeout.
//! A timed-out child is killed when its handle drops.

use std::process::Stdio;
use std::time::Duration;

use jobflow_core::runner::{CommandOutput, CommandRunner, Invocation, RunnerError};
use jobflow_types::config::GlobalConfig;
use tokio::process::Command;

#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }

    pub fn from_config(config: &GlobalConfig) -> Self {
        Self {
            timeout: config.command_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, RunnerError> {
        let (program, args) = invocation
            .argv
            .split_first()
            .ok_or(RunnerError::EmptyCommand)?;

        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(&invocation.working_dir)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|source| RunnerError::Spawn {
            program: program.clone(),
            source,
        })?;
        tracing::debug!(program = program.as_str(), pid = ?child.id(), "spawned job process");

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| RunnerError::Timeout {
                    secs: limit.as_secs(),
                })??,
            None => child.wait_with_output().await?,
        };

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
