//! Automation definition files.
//!
//! A YAML file declares task contracts and jobs; `AutomationFile::build`
//! replays the jobs through `GraphBuilder` in file order, so a file is
//! subject to exactly the same validation as an automation written in Rust.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use jobflow_types::contract::{ParamSpec, TaskContract};
use jobflow_types::error::GraphError;
use jobflow_types::expression::Expression;
use jobflow_types::job::{InputValue, JobId, Matrix};
use jobflow_types::literal::Literal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::{Automation, AutomationBuilder, BuildMode, GraphBuilder, JobHandle, JobSpec};
use crate::registry::TaskRegistry;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DefinitionError {
    /// YAML parse failure.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A reference is not of the form `<job>.<name>` with a known job.
    #[error("job '{job}' references '{reference}', which names no earlier job")]
    UnknownJobReference { job: String, reference: String },
}

// ---------------------------------------------------------------------------
// File model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationFile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<serde_json::Value>,
    #[serde(default)]
    pub params: Vec<ParamSpec>,
    #[serde(default)]
    pub tasks: Vec<TaskContract>,
    #[serde(default)]
    pub jobs: Vec<JobEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEntry {
    pub task: String,
    /// Defaults to the task name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: BTreeMap<String, InputEntry>,
    #[serde(default)]
    pub needs: Vec<String>,
    /// Written as nested single-key maps, `{ not: { param: dry_run } }`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_yaml_ng::with::singleton_map_recursive"
    )]
    pub condition: Option<Expression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<Matrix>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runs_on: Option<String>,
}

impl JobEntry {
    pub fn job_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.task)
    }
}

/// `{ output: job.name }`, `{ artifact: job.name }` or a bare literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputEntry {
    Output { output: String },
    Artifact { artifact: String },
    Literal(Literal),
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

pub fn parse_automation_yaml(yaml: &str) -> Result<AutomationFile, DefinitionError> {
    serde_yaml_ng::from_str(yaml).map_err(|e| DefinitionError::Parse(e.to_string()))
}

pub fn load_automation_file(path: &Path) -> Result<AutomationFile, DefinitionError> {
    let content = std::fs::read_to_string(path)?;
    parse_automation_yaml(&content)
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

impl AutomationFile {
    /// Register the file's tasks and declare its jobs in file order.
    pub fn build(&self, mode: BuildMode) -> Result<Automation, DefinitionError> {
        let mut registry = TaskRegistry::new();
        for task in &self.tasks {
            registry.register(task.clone())?;
        }

        let mut automation = AutomationBuilder::new(self.name.clone());
        if let Some(trigger) = &self.trigger {
            automation = automation.trigger(trigger.clone());
        }
        for param in &self.params {
            automation = automation.param(param.clone());
        }

        let mut graph = GraphBuilder::new(mode);
        let mut handles: HashMap<String, JobHandle> = HashMap::new();

        for entry in &self.jobs {
            let contract = registry.get(&entry.task)?;
            let job_name = entry.job_name();
            let mut spec = JobSpec::new(contract).name(job_name);

            for (param, input) in &entry.inputs {
                let value = resolve_input(job_name, input, &handles)?;
                spec = spec.input(param.clone(), value);
            }
            for need in &entry.needs {
                spec = spec.needs_id(JobId::new(need.clone()));
            }
            if let Some(condition) = &entry.condition {
                spec = spec.condition(condition.clone());
            }
            if let Some(matrix) = &entry.matrix {
                spec = spec.matrix(matrix.clone());
            }
            if let Some(runs_on) = &entry.runs_on {
                spec = spec.runs_on(runs_on.clone());
            }

            let handle = graph.declare_job(spec)?;
            handles.insert(job_name.to_string(), handle);
        }

        tracing::debug!(
            automation = self.name.as_str(),
            tasks = registry.len(),
            jobs = self.jobs.len(),
            "built automation from definition"
        );

        Ok(automation.finish(graph))
    }
}

fn resolve_input(
    job: &str,
    input: &InputEntry,
    handles: &HashMap<String, JobHandle>,
) -> Result<InputValue, DefinitionError> {
    match input {
        InputEntry::Literal(lit) => Ok(InputValue::Literal(lit.clone())),
        InputEntry::Output { output } => {
            let (handle, name) = split_reference(job, output, handles)?;
            Ok(handle.output(name)?.into())
        }
        InputEntry::Artifact { artifact } => {
            let (handle, name) = split_reference(job, artifact, handles)?;
            Ok(handle.artifact(name)?.into())
        }
    }
}

/// Split `<job>.<name>` at the last `.`; job names may contain dots.
fn split_reference<'a>(
    job: &str,
    reference: &'a str,
    handles: &'a HashMap<String, JobHandle>,
) -> Result<(&'a JobHandle, &'a str), DefinitionError> {
    let unknown = || DefinitionError::UnknownJobReference {
        job: job.to_string(),
        reference: reference.to_string(),
    };
    let (producer, name) = reference.rsplit_once('.').ok_or_else(unknown)?;
    let handle = handles.get(producer).ok_or_else(unknown)?;
    Ok((handle, name))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const RELEASE: &str = r#"
name: release
trigger: { push: { branches: [main] } }
params:
  - { name: env, type: string, default: staging }
tasks:
  - name: build
    outputs: [{ name: version, type: string }]
    artifacts: [wheel]
  - name: test
    params: [{ name: os, type: string }]
  - name: publish
    params: [{ name: version, type: string }, { name: package, type: path }]
    secrets: [PYPI_TOKEN]
jobs:
  - task: build
  - task: test
    needs: [build]
    matrix: { os: [linux, macos] }
    inputs:
      os: "${{ matrix.os }}"
  - task: publish
    needs: [test]
    inputs:
      version: { output: build.version }
      package: { artifact: build.wheel }
    condition: { eq: [{ param: env }, { literal: prod }] }
"#;

    #[test]
    fn test_parse_and_build_generate_mode() {
        let file = parse_automation_yaml(RELEASE).unwrap();
        assert_eq!(file.tasks.len(), 3);
        assert_eq!(
            file.jobs[2].inputs["version"],
            InputEntry::Output {
                output: "build.version".to_string()
            }
        );

        let automation = file.build(BuildMode::Generate).unwrap();
        assert_eq!(automation.name(), "release");
        assert_eq!(automation.params()[0].name, "env");

        let graph = automation.graph();
        assert_eq!(graph.len(), 3);
        assert_eq!(
            graph.dependencies(&JobId::from("publish")),
            &[JobId::from("build"), JobId::from("test")]
        );
        assert!(graph.job(&JobId::from("publish")).unwrap().condition.is_some());
    }

    #[test]
    fn test_nested_condition_maps_parse_to_expression_tree() {
        use crate::expression::{and_, context_ref, negate, param_eq, param_ref};

        let file = parse_automation_yaml(RELEASE).unwrap();
        assert_eq!(
            file.jobs[2].condition,
            Some(param_eq(param_ref("env"), "prod"))
        );

        let yaml = r#"
name: x
tasks:
  - { name: deploy }
jobs:
  - task: deploy
    condition:
      and:
        - { not: { param: dry_run } }
        - { eq: [{ context: github.ref_name }, { literal: main }] }
"#;
        let file = parse_automation_yaml(yaml).unwrap();
        assert_eq!(
            file.jobs[0].condition,
            Some(and_(
                negate(param_ref("dry_run")),
                param_eq(context_ref("github.ref_name"), "main"),
            ))
        );

        let unconditioned = parse_automation_yaml("name: x\njobs:\n  - task: a\n").unwrap();
        assert_eq!(unconditioned.jobs[0].condition, None);
    }

    #[test]
    fn test_build_local_mode_expands_matrix() {
        let automation = parse_automation_yaml(RELEASE)
            .unwrap()
            .build(BuildMode::Local)
            .unwrap();
        let graph = automation.graph();
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.instances(&JobId::from("test")).len(), 2);
        let linux = graph.job(&JobId::from("test[os=linux]")).unwrap();
        assert_eq!(
            linux.inputs["os"],
            InputValue::Literal(Literal::String("linux".to_string()))
        );
    }

    #[test]
    fn test_unknown_task_rejected() {
        let yaml = "name: x\njobs:\n  - task: missing\n";
        let err = parse_automation_yaml(yaml)
            .unwrap()
            .build(BuildMode::Local)
            .unwrap_err();
        assert!(matches!(
            err,
            DefinitionError::Graph(GraphError::UnknownTask(ref t)) if t == "missing"
        ));
    }

    #[test]
    fn test_reference_to_later_job_rejected() {
        let yaml = r#"
name: x
tasks:
  - { name: a, params: [{ name: v, type: string }] }
  - { name: b, outputs: [{ name: v, type: string }] }
jobs:
  - task: a
    inputs: { v: { output: b.v } }
  - task: b
"#;
        let err = parse_automation_yaml(yaml)
            .unwrap()
            .build(BuildMode::Generate)
            .unwrap_err();
        match err {
            DefinitionError::UnknownJobReference { job, reference } => {
                assert_eq!(job, "a");
                assert_eq!(reference, "b.v");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_undeclared_output_reference_rejected() {
        let yaml = r#"
name: x
tasks:
  - { name: a }
  - { name: b, params: [{ name: v, type: string }] }
jobs:
  - task: a
  - task: b
    inputs: { v: { output: a.nope } }
"#;
        let err = parse_automation_yaml(yaml)
            .unwrap()
            .build(BuildMode::Generate)
            .unwrap_err();
        assert!(matches!(
            err,
            DefinitionError::Graph(GraphError::UndeclaredOutput { .. })
        ));
    }

    #[test]
    fn test_job_name_defaults_to_task_and_may_be_overridden() {
        let yaml = r#"
name: x
tasks:
  - { name: lint }
jobs:
  - task: lint
  - task: lint
    name: lint.strict
    needs: [lint]
"#;
        let automation = parse_automation_yaml(yaml)
            .unwrap()
            .build(BuildMode::Local)
            .unwrap();
        let graph = automation.graph();
        assert_eq!(
            graph.dependencies(&JobId::from("lint.strict")),
            &[JobId::from("lint")]
        );
    }

    #[test]
    fn test_parse_error_reported() {
        let err = parse_automation_yaml("name: [unclosed").unwrap_err();
        assert!(matches!(err, DefinitionError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("release.yaml");
        std::fs::write(&path, RELEASE).unwrap();
        let file = load_automation_file(&path).unwrap();
        assert_eq!(file.name, "release");

        let missing = load_automation_file(&dir.path().join("none.yaml")).unwrap_err();
        assert!(matches!(missing, DefinitionError::Io(_)));
    }
}
