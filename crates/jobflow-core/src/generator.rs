//! Workflow descriptor generator.
//!
//! Turns an automation into an `ExternalDocument`: one unit per job, with
//! the exact command line the local executor would run, the dependency list
//! the graph computed, and the rendered condition. Pure, total over graphs
//! the builder accepted, and free of I/O.

use std::path::PathBuf;

use jobflow_types::config::GlobalConfig;
use jobflow_types::document::{ArtifactDownload, DocumentJob, ExternalDocument};
use jobflow_types::job::{InputValue, Job};

use crate::command::{CommandTemplate, artifact_path, display_command};
use crate::expression;
use crate::graph::{Automation, Graph};

#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    pub entry_point: Vec<String>,
    pub artifact_dir: PathBuf,
    /// Placement for jobs that do not set `runs_on`.
    pub default_runs_on: Option<String>,
}

impl GeneratorOptions {
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self {
            entry_point: config.entry_point.clone(),
            artifact_dir: config.artifact_dir.clone(),
            default_runs_on: config.default_runs_on.clone(),
        }
    }
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self::from_config(&GlobalConfig::default())
    }
}

pub fn render(automation: &Automation, options: &GeneratorOptions) -> ExternalDocument {
    let graph = automation.graph();
    ExternalDocument {
        name: automation.name().to_string(),
        trigger: automation.trigger().clone(),
        params: automation.params().to_vec(),
        jobs: graph
            .jobs()
            .iter()
            .map(|job| render_job(graph, job, options))
            .collect(),
    }
}

fn render_job(graph: &Graph, job: &Job, options: &GeneratorOptions) -> DocumentJob {
    let template = CommandTemplate::for_job(job, &options.entry_point, &options.artifact_dir);
    let downloads = job
        .inputs
        .values()
        .filter_map(|value| match value {
            InputValue::Artifact(r) => Some(ArtifactDownload {
                job: r.job().to_string(),
                name: r.name().to_string(),
                path: artifact_path(&options.artifact_dir, r.job().as_str(), r.name()),
            }),
            _ => None,
        })
        .collect();

    DocumentJob {
        name: job.id.to_string(),
        task: job.task().to_string(),
        needs: graph
            .dependencies(&job.id)
            .iter()
            .map(ToString::to_string)
            .collect(),
        condition: job.condition.as_ref().map(expression::render),
        command: display_command(&template.render_for_document()),
        matrix: job.matrix.clone(),
        runs_on: job
            .runs_on
            .clone()
            .or_else(|| options.default_runs_on.clone()),
        outputs: job.contract.outputs.iter().map(|o| o.name.clone()).collect(),
        artifacts: job.contract.artifacts.clone(),
        downloads,
        secrets: job.contract.secrets.clone(),
    }
}
