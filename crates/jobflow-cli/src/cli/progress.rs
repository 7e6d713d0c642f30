//! Live progress output for `jobflow run`.
//!
//! Subscribes to the executor's event bus and prints one line per event:
//! wave headers, `✓` / `✗` / `○` per job, and durations.

use console::style;
use jobflow_types::event::ExecutorEvent;
use jobflow_types::run::JobState;
use tokio::sync::broadcast;

/// Print events until the run finishes or the bus closes.
pub async fn render_progress(mut rx: broadcast::Receiver<ExecutorEvent>, verbose: bool) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                let finished = matches!(event, ExecutorEvent::RunFinished { .. });
                if let Some(line) = describe(&event, verbose) {
                    println!("{line}");
                }
                if finished {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "progress output fell behind; events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// The progress line for one event, if it warrants one.
pub fn describe(event: &ExecutorEvent, verbose: bool) -> Option<String> {
    match event {
        ExecutorEvent::RunStarted {
            automation,
            total_jobs,
            ..
        } => Some(format!(
            "\n  {} Running '{}' ({} jobs)\n",
            style("▶").bold(),
            style(automation).cyan(),
            total_jobs
        )),
        ExecutorEvent::WaveStarted { wave, jobs, .. } => Some(format!(
            "  {} {}",
            style(format!("Wave {}", wave + 1)).bold(),
            style(
                jobs.iter()
                    .map(|j| j.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
            .dim()
        )),
        ExecutorEvent::JobStarted { job, command, .. } => verbose.then(|| {
            format!("    {} {} {}", style("…").dim(), job, style(command).dim())
        }),
        ExecutorEvent::JobSkipped { job, reason, .. } => Some(format!(
            "    {} {} {}",
            style("○").yellow(),
            job,
            style(format!("skipped: {reason}")).dim()
        )),
        ExecutorEvent::JobFinished {
            job,
            state,
            duration_ms,
            exit_code,
            ..
        } => Some(match state {
            JobState::Succeeded => format!(
                "    {} {} {}",
                style("✓").green(),
                job,
                style(format_duration(*duration_ms)).dim()
            ),
            _ => {
                let detail = match exit_code {
                    Some(code) => format!("exit {code}, {}", format_duration(*duration_ms)),
                    None => format_duration(*duration_ms),
                };
                format!("    {} {} {}", style("✗").red(), job, style(detail).dim())
            }
        }),
        ExecutorEvent::RunFinished { .. } => None,
    }
}

/// `850ms`, `1.2s`, `2m 03s`.
pub fn format_duration(ms: u64) -> String {
    if ms < 1_000 {
        format!("{ms}ms")
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1_000.0)
    } else {
        let secs = ms / 1_000;
        format!("{}m {:02}s", secs / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use jobflow_types::job::JobId;
    use jobflow_types::run::{RunStatus, SkipReason};
    use uuid::Uuid;

    use super::*;

    #[test]
    fn durations_scale_units() {
        assert_eq!(format_duration(850), "850ms");
        assert_eq!(format_duration(1_240), "1.2s");
        assert_eq!(format_duration(123_000), "2m 03s");
    }

    #[test]
    fn job_lines_carry_glyphs() {
        console::set_colors_enabled(false);
        let run_id = Uuid::now_v7();

        let done = describe(
            &ExecutorEvent::JobFinished {
                run_id,
                job: JobId::from("lint"),
                state: JobState::Succeeded,
                duration_ms: 20,
                exit_code: Some(0),
            },
            false,
        )
        .unwrap();
        assert_eq!(done, "    ✓ lint 20ms");

        let failed = describe(
            &ExecutorEvent::JobFinished {
                run_id,
                job: JobId::from("test"),
                state: JobState::Failed,
                duration_ms: 5,
                exit_code: Some(2),
            },
            false,
        )
        .unwrap();
        assert_eq!(failed, "    ✗ test exit 2, 5ms");

        let skipped = describe(
            &ExecutorEvent::JobSkipped {
                run_id,
                job: JobId::from("deploy"),
                reason: SkipReason::ConditionFalse,
            },
            false,
        )
        .unwrap();
        assert_eq!(skipped, "    ○ deploy skipped: condition is false");
    }

    #[test]
    fn started_lines_only_when_verbose() {
        let event = ExecutorEvent::JobStarted {
            run_id: Uuid::now_v7(),
            job: JobId::from("lint"),
            wave: 0,
            command: "jobflow-task lint".to_string(),
        };
        assert!(describe(&event, false).is_none());
        assert!(describe(&event, true).is_some());
        assert!(
            describe(
                &ExecutorEvent::RunFinished {
                    run_id: Uuid::now_v7(),
                    status: RunStatus::Succeeded,
                    duration_ms: 1,
                },
                true
            )
            .is_none()
        );
    }
}
