//! `jobflow run`: local execution with live progress.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use jobflow_core::definition::load_automation_file;
use jobflow_core::event::EventBus;
use jobflow_core::executor::{ExecutorOptions, LocalExecutor};
use jobflow_core::graph::BuildMode;
use jobflow_infra::process::ProcessRunner;
use jobflow_infra::secret::env::EnvSecretProvider;
use jobflow_types::config::GlobalConfig;

use super::{bindings, progress, summary};

pub struct RunArgs<'a> {
    pub file: &'a Path,
    pub params: &'a [String],
    pub context: &'a [String],
    pub working_dir: Option<PathBuf>,
}

pub struct OutputMode {
    pub json: bool,
    pub quiet: bool,
    pub verbose: bool,
}

/// Run the automation; returns whether every attempted job succeeded.
pub async fn handle_run(args: RunArgs<'_>, config: &GlobalConfig, output: OutputMode) -> Result<bool> {
    let automation = load_automation_file(args.file)
        .and_then(|file| file.build(BuildMode::Local))
        .with_context(|| format!("Failed to load automation from {}", args.file.display()))?;

    let env = bindings::environment(&automation, &config.context, args.params, args.context)?;

    let mut options = ExecutorOptions::from_config(config);
    if let Some(dir) = args.working_dir {
        options.working_dir = dir;
    }

    let event_bus = EventBus::default();
    let renderer = (!output.json && !output.quiet).then(|| {
        tokio::spawn(progress::render_progress(
            event_bus.subscribe(),
            output.verbose,
        ))
    });

    let executor = LocalExecutor::new(
        Arc::new(ProcessRunner::from_config(config)),
        EnvSecretProvider::new(),
        options,
        event_bus,
    );
    let result = executor.execute(&automation, &env).await;
    drop(executor);

    if let Some(handle) = renderer {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "progress renderer stopped unexpectedly");
        }
    }

    let report = result.with_context(|| format!("Run of '{}' could not start", automation.name()))?;

    if output.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !output.quiet {
        summary::print_summary(&report);
    }

    Ok(report.succeeded())
}
