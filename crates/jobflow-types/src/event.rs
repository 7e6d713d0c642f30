//! Event types for the executor event bus.
//!
//! `ExecutorEvent` is broadcast while a run progresses. Every variant is
//! Clone + Send + Sync for use with tokio broadcast channels; subscribers
//! (the CLI progress renderer, tests) format them however they like.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::job::JobId;
use crate::run::{JobState, RunStatus, SkipReason};

/// Events emitted during a local run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutorEvent {
    /// Pre-flight checks passed and the first wave is about to be computed.
    RunStarted {
        run_id: Uuid,
        automation: String,
        total_jobs: usize,
    },

    /// A wave has been computed and its members are about to be dispatched.
    WaveStarted {
        run_id: Uuid,
        wave: usize,
        jobs: Vec<JobId>,
    },

    /// A job's subprocess is being launched.
    JobStarted {
        run_id: Uuid,
        job: JobId,
        wave: usize,
        command: String,
    },

    /// A job moved straight to `Skipped` without running.
    JobSkipped {
        run_id: Uuid,
        job: JobId,
        reason: SkipReason,
    },

    /// A job reached `Succeeded` or `Failed`.
    JobFinished {
        run_id: Uuid,
        job: JobId,
        state: JobState,
        duration_ms: u64,
        exit_code: Option<i32>,
    },

    /// All waves drained, or a failed wave halted progression.
    RunFinished {
        run_id: Uuid,
        status: RunStatus,
        duration_ms: u64,
    },
}

impl ExecutorEvent {
    pub fn run_id(&self) -> Uuid {
        match self {
            ExecutorEvent::RunStarted { run_id, .. }
            | ExecutorEvent::WaveStarted { run_id, .. }
            | ExecutorEvent::JobStarted { run_id, .. }
            | ExecutorEvent::JobSkipped { run_id, .. }
            | ExecutorEvent::JobFinished { run_id, .. }
            | ExecutorEvent::RunFinished { run_id, .. } => *run_id,
        }
    }

    /// The serialized `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutorEvent::RunStarted { .. } => "run_started",
            ExecutorEvent::WaveStarted { .. } => "wave_started",
            ExecutorEvent::JobStarted { .. } => "job_started",
            ExecutorEvent::JobSkipped { .. } => "job_skipped",
            ExecutorEvent::JobFinished { .. } => "job_finished",
            ExecutorEvent::RunFinished { .. } => "run_finished",
        }
    }

    /// The job an event concerns, if any.
    pub fn job(&self) -> Option<&JobId> {
        match self {
            ExecutorEvent::JobStarted { job, .. }
            | ExecutorEvent::JobSkipped { job, .. }
            | ExecutorEvent::JobFinished { job, .. } => Some(job),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_finished_serde_shape() {
        let event = ExecutorEvent::JobFinished {
            run_id: Uuid::nil(),
            job: JobId::from("test"),
            state: JobState::Failed,
            duration_ms: 1200,
            exit_code: Some(2),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "job_finished");
        assert_eq!(json["state"], "failed");
        assert_eq!(json["exit_code"], 2);
        assert_eq!(event.run_id(), Uuid::nil());
        assert_eq!(event.kind(), "job_finished");
        assert_eq!(event.job().map(JobId::as_str), Some("test"));
    }

    #[test]
    fn test_job_skipped_roundtrip() {
        let event = ExecutorEvent::JobSkipped {
            run_id: Uuid::now_v7(),
            job: JobId::from("deploy"),
            reason: SkipReason::ConditionFalse,
        };
        let json = serde_json::to_string(&event).unwrap();
        let parsed: ExecutorEvent = serde_json::from_str(&json).unwrap();
        match parsed {
            ExecutorEvent::JobSkipped { job, reason, .. } => {
                assert_eq!(job.as_str(), "deploy");
                assert_eq!(reason, SkipReason::ConditionFalse);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
