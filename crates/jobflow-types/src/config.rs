//! Global configuration types for jobflow.
//!
//! `GlobalConfig` represents the `jobflow.toml` that controls how task
//! command lines are built, where artifacts live, and which context values
//! are bound by default for condition evaluation.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::literal::Literal;

/// Top-level configuration. All fields have defaults, so an empty file is a
/// valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Program (and leading arguments) every task command line starts with.
    #[serde(default = "default_entry_point")]
    pub entry_point: Vec<String>,

    /// Artifact root, relative to the working directory.
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,

    /// Working directory for local runs. Defaults to the current directory.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Placement applied by the generator to jobs that set none.
    #[serde(default)]
    pub default_runs_on: Option<String>,

    /// Per-command timeout enforced by the process runner.
    #[serde(default)]
    pub command_timeout_secs: Option<u64>,

    /// Context bindings available to every run (e.g. `event_name`).
    #[serde(default)]
    pub context: BTreeMap<String, Literal>,
}

fn default_entry_point() -> Vec<String> {
    vec!["jobflow-task".to_string()]
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from(".jobflow/artifacts")
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            entry_point: default_entry_point(),
            artifact_dir: default_artifact_dir(),
            working_dir: None,
            default_runs_on: None,
            command_timeout_secs: None,
            context: BTreeMap::new(),
        }
    }
}
