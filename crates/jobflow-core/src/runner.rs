//! Command runner trait definition.
//!
//! The executor never spawns processes itself. It hands a fully resolved
//! `Invocation` to a `CommandRunner` and records what comes back. Timeouts
//! are the runner's concern.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One command to run: argv, working directory, and extra environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub argv: Vec<String>,
    pub working_dir: PathBuf,
    /// Added to (not replacing) the runner's inherited environment.
    pub env: BTreeMap<String, String>,
}

/// Exit status and captured streams of a finished command.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("empty command line")]
    EmptyCommand,

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("I/O error while running command: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for command execution backends.
///
/// Uses RPITIT for the async method, consistent with the workspace's
/// edition 2024 collaborator traits.
pub trait CommandRunner: Send + Sync {
    /// Run the command to completion and capture its output.
    fn run(
        &self,
        invocation: &Invocation,
    ) -> impl std::future::Future<Output = Result<CommandOutput, RunnerError>> + Send;
}
