//! End-of-run summary table.

use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use jobflow_types::run::{JobRecord, JobState, RunReport};

use super::progress::format_duration;

/// Lines of stderr shown for each failed job.
const STDERR_TAIL: usize = 10;

pub fn summary_table(report: &RunReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Job").fg(Color::Cyan),
            Cell::new("Task"),
            Cell::new("State"),
            Cell::new("Wave"),
            Cell::new("Duration"),
            Cell::new("Detail"),
        ]);

    for record in &report.jobs {
        table.add_row(vec![
            Cell::new(record.job.as_str()),
            Cell::new(&record.task),
            state_cell(record.state),
            Cell::new(record.wave.map(|w| (w + 1).to_string()).unwrap_or_default()),
            Cell::new(record.duration_ms.map(format_duration).unwrap_or_default()),
            Cell::new(detail(record)),
        ]);
    }

    table
}

fn state_cell(state: JobState) -> Cell {
    let cell = Cell::new(state.to_string());
    match state {
        JobState::Succeeded => cell.fg(Color::Green),
        JobState::Failed => cell.fg(Color::Red),
        JobState::Skipped => cell.fg(Color::Yellow),
        JobState::Pending | JobState::Running => cell.fg(Color::DarkGrey),
    }
}

/// Why a job ended the way it did.
pub fn detail(record: &JobRecord) -> String {
    match record.state {
        JobState::Skipped => record
            .skip_reason
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default(),
        JobState::Failed => record.error.clone().unwrap_or_default(),
        JobState::Pending => "not attempted".to_string(),
        JobState::Succeeded if !record.outputs.is_empty() => record
            .outputs
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    }
}

/// Print the table, the stderr tail of failed jobs and a closing line.
pub fn print_summary(report: &RunReport) {
    println!();
    println!("{}", summary_table(report));

    for record in report.jobs.iter().filter(|r| r.state == JobState::Failed) {
        let lines: Vec<&str> = record.stderr.lines().collect();
        if lines.is_empty() {
            continue;
        }
        println!();
        println!("  {} stderr of '{}':", style("✗").red(), record.job);
        for line in &lines[lines.len().saturating_sub(STDERR_TAIL)..] {
            println!("    {}", style(line).dim());
        }
    }

    println!();
    let verdict = if report.succeeded() {
        style("succeeded").green().bold()
    } else {
        style("failed").red().bold()
    };
    println!(
        "  Run {} {} in {} ({} waves, {} succeeded, {} failed, {} skipped, {} not attempted)",
        style(report.run_id).dim(),
        verdict,
        format_duration(report.duration_ms),
        report.waves,
        report.count(JobState::Succeeded),
        report.count(JobState::Failed),
        report.count(JobState::Skipped),
        report.count(JobState::Pending),
    );
    println!();
}
