//! Execution records produced by the local executor.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::job::JobId;

// ---------------------------------------------------------------------------
// Job state
// ---------------------------------------------------------------------------

/// Per-job state machine: `Pending -> {Skipped | Running -> {Succeeded | Failed}}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Skipped,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Skipped | JobState::Succeeded | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Skipped => "skipped",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Why a job moved to `Skipped` without running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SkipReason {
    /// The job's condition evaluated false.
    ConditionFalse,
    /// A referenced output or artifact is absent because its producer did
    /// not produce it (typically because the producer was skipped).
    UnresolvedInput { producer: JobId, name: String },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::ConditionFalse => f.write_str("condition is false"),
            SkipReason::UnresolvedInput { producer, name } => {
                write!(f, "input '{producer}.{name}' is unavailable")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Result record for one job. Written once, when the job reaches a terminal
/// state; jobs that were never attempted keep the `Pending` record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job: JobId,
    pub task: String,
    pub state: JobState,
    /// Index of the wave the job was scheduled in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wave: Option<usize>,
    /// The command line as displayed, identical to the document's text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
    #[serde(default)]
    pub artifacts: BTreeMap<String, PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobRecord {
    /// A fresh record for a job that has not been attempted.
    pub fn pending(job: JobId, task: impl Into<String>) -> Self {
        Self {
            job,
            task: task.into(),
            state: JobState::Pending,
            wave: None,
            command: None,
            exit_code: None,
            duration_ms: None,
            started_at: None,
            stdout: String::new(),
            stderr: String::new(),
            outputs: BTreeMap::new(),
            artifacts: BTreeMap::new(),
            skip_reason: None,
            error: None,
        }
    }
}

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

/// Ordered per-job results of one local execution, in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub automation: String,
    pub status: RunStatus,
    /// Number of waves that were started.
    pub waves: usize,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub jobs: Vec<JobRecord>,
}

impl RunReport {
    pub fn job(&self, name: &str) -> Option<&JobRecord> {
        self.jobs.iter().find(|r| r.job.as_str() == name)
    }

    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    /// Jobs that never ran because an earlier wave failed.
    pub fn not_attempted(&self) -> impl Iterator<Item = &JobRecord> {
        self.jobs.iter().filter(|r| r.state == JobState::Pending)
    }

    pub fn count(&self, state: JobState) -> usize {
        self.jobs.iter().filter(|r| r.state == state).count()
    }
}
