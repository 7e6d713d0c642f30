//! Graph construction.
//!
//! `GraphBuilder::declare_job` validates each job against its task contract
//! and against the jobs declared before it, then appends it. Construction is
//! single-threaded, synchronous, and never executes anything.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use jobflow_types::contract::{ParamSpec, TaskContract};
use jobflow_types::document::Trigger;
use jobflow_types::error::GraphError;
use jobflow_types::expression::Expression;
use jobflow_types::job::{
    ArtifactRef, InputValue, Job, JobId, JobOutputRef, Matrix, MatrixInstance,
};
use jobflow_types::literal::Literal;
use serde::{Deserialize, Serialize};

use super::Graph;
use super::matrix;

/// Whether the graph is being built for rendering or for a local run.
///
/// Matrix jobs stay a single unit in `Generate` mode (the CI system expands
/// them) and are expanded into one job per combination in `Local` mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildMode {
    Generate,
    Local,
}

// ---------------------------------------------------------------------------
// JobSpec
// ---------------------------------------------------------------------------

/// Arguments to `declare_job`, assembled with chainable setters.
#[derive(Debug, Clone)]
pub struct JobSpec {
    contract: Arc<TaskContract>,
    name: Option<String>,
    inputs: BTreeMap<String, InputValue>,
    needs: Vec<JobId>,
    condition: Option<Expression>,
    matrix: Option<Matrix>,
    runs_on: Option<String>,
}

impl JobSpec {
    pub fn new(contract: Arc<TaskContract>) -> Self {
        Self {
            contract,
            name: None,
            inputs: BTreeMap::new(),
            needs: Vec::new(),
            condition: None,
            matrix: None,
            runs_on: None,
        }
    }

    /// Override the job name (defaults to the task name).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn input(mut self, param: impl Into<String>, value: impl Into<InputValue>) -> Self {
        self.inputs.insert(param.into(), value.into());
        self
    }

    pub fn needs(mut self, job: &JobHandle) -> Self {
        self.needs.push(job.id().clone());
        self
    }

    pub fn needs_id(mut self, job: JobId) -> Self {
        self.needs.push(job);
        self
    }

    pub fn condition(mut self, condition: Expression) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn matrix(mut self, matrix: Matrix) -> Self {
        self.matrix = Some(matrix);
        self
    }

    pub fn runs_on(mut self, runs_on: impl Into<String>) -> Self {
        self.runs_on = Some(runs_on.into());
        self
    }
}

// ---------------------------------------------------------------------------
// JobHandle
// ---------------------------------------------------------------------------

/// Returned by `declare_job`; the only way to obtain references to a job's
/// outputs and artifacts.
#[derive(Debug, Clone)]
pub struct JobHandle {
    id: JobId,
    contract: Arc<TaskContract>,
}

impl JobHandle {
    /// The job name. For a local-mode matrix job this is the group name.
    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn contract(&self) -> &Arc<TaskContract> {
        &self.contract
    }

    pub fn output(&self, name: &str) -> Result<JobOutputRef, GraphError> {
        let spec = self
            .contract
            .output(name)
            .ok_or_else(|| GraphError::UndeclaredOutput {
                job: self.id.to_string(),
                output: name.to_string(),
            })?;
        Ok(JobOutputRef::new(self.id.clone(), name, spec.output_type))
    }

    pub fn artifact(&self, name: &str) -> Result<ArtifactRef, GraphError> {
        if !self.contract.has_artifact(name) {
            return Err(GraphError::UndeclaredArtifact {
                job: self.id.to_string(),
                artifact: name.to_string(),
            });
        }
        Ok(ArtifactRef::new(self.id.clone(), name))
    }
}

// ---------------------------------------------------------------------------
// GraphBuilder
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct GraphBuilder {
    mode: BuildMode,
    jobs: Vec<Job>,
    index: HashMap<JobId, usize>,
    groups: HashMap<JobId, Vec<JobId>>,
    /// Contract of every name a reference may target: jobs and groups.
    producers: HashMap<JobId, Arc<TaskContract>>,
}

impl GraphBuilder {
    pub fn new(mode: BuildMode) -> Self {
        Self {
            mode,
            jobs: Vec::new(),
            index: HashMap::new(),
            groups: HashMap::new(),
            producers: HashMap::new(),
        }
    }

    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    /// Validate `spec` and append the resulting job (or, for a local-mode
    /// matrix, one job per combination).
    pub fn declare_job(&mut self, spec: JobSpec) -> Result<JobHandle, GraphError> {
        let contract = Arc::clone(&spec.contract);
        let name = JobId::new(spec.name.clone().unwrap_or_else(|| contract.name.clone()));

        if self.producers.contains_key(&name) {
            return Err(GraphError::DuplicateJob(name.to_string()));
        }
        self.validate_inputs(&name, &spec)?;
        for dep in &spec.needs {
            if !self.producers.contains_key(dep) {
                return Err(GraphError::UnknownJob {
                    job: name.to_string(),
                    dependency: dep.to_string(),
                });
            }
        }
        if let Some(m) = &spec.matrix {
            validate_matrix(&name, m)?;
        }

        match (self.mode, spec.matrix.clone()) {
            (BuildMode::Local, Some(m)) => self.push_expanded(name.clone(), spec, &m)?,
            (_, matrix) => {
                let job = Job {
                    id: name.clone(),
                    contract: Arc::clone(&contract),
                    inputs: spec.inputs,
                    needs: spec.needs,
                    condition: spec.condition,
                    matrix,
                    runs_on: spec.runs_on,
                    instance: None,
                };
                self.push(job);
            }
        }

        self.producers.insert(name.clone(), Arc::clone(&contract));
        tracing::debug!(job = %name, task = contract.name.as_str(), "declared job");
        Ok(JobHandle { id: name, contract })
    }

    /// Freeze the declared jobs into an immutable graph.
    pub fn finish(self) -> Graph {
        Graph::new(self.mode, self.jobs, self.index, self.groups)
    }

    fn push(&mut self, job: Job) {
        self.index.insert(job.id.clone(), self.jobs.len());
        self.jobs.push(job);
    }

    fn push_expanded(
        &mut self,
        group: JobId,
        spec: JobSpec,
        matrix: &Matrix,
    ) -> Result<(), GraphError> {
        let assignments = matrix::expand(matrix);
        let instances: Vec<JobId> = assignments
            .iter()
            .map(|a| matrix::instance_name(group.as_str(), a))
            .collect();
        for id in &instances {
            if self.producers.contains_key(id) {
                return Err(GraphError::DuplicateJob(id.to_string()));
            }
        }

        for (id, assignment) in instances.iter().zip(assignments) {
            let inputs = spec
                .inputs
                .iter()
                .map(|(param, value)| {
                    let value = match value {
                        InputValue::Literal(Literal::String(s)) => {
                            InputValue::Literal(Literal::String(matrix::substitute(s, &assignment)))
                        }
                        other => other.clone(),
                    };
                    (param.clone(), value)
                })
                .collect();
            let job = Job {
                id: id.clone(),
                contract: Arc::clone(&spec.contract),
                inputs,
                needs: spec.needs.clone(),
                condition: spec.condition.clone(),
                matrix: None,
                runs_on: spec
                    .runs_on
                    .as_deref()
                    .map(|r| matrix::substitute(r, &assignment)),
                instance: Some(MatrixInstance {
                    group: group.clone(),
                    assignment,
                }),
            };
            self.push(job);
            self.producers
                .insert(id.clone(), Arc::clone(&spec.contract));
        }

        self.groups.insert(group, instances);
        Ok(())
    }

    fn validate_inputs(&self, job: &JobId, spec: &JobSpec) -> Result<(), GraphError> {
        let contract = &spec.contract;

        for key in spec.inputs.keys() {
            if contract.param(key).is_none() {
                return Err(GraphError::UnknownParameter {
                    job: job.to_string(),
                    task: contract.name.clone(),
                    param: key.clone(),
                });
            }
        }

        for (key, value) in &spec.inputs {
            let Some(param) = contract.param(key) else {
                continue;
            };
            if let InputValue::Literal(lit) = value {
                if !param.param_type.accepts(lit) {
                    return Err(GraphError::TypeMismatch {
                        job: job.to_string(),
                        param: key.clone(),
                        expected: param.param_type,
                        actual: lit.param_type(),
                    });
                }
            }
        }

        for (key, value) in &spec.inputs {
            let Some(param) = contract.param(key) else {
                continue;
            };
            let Some(producer) = value.producer() else {
                continue;
            };
            let producer_contract =
                self.producers
                    .get(producer)
                    .ok_or_else(|| GraphError::UnknownJob {
                        job: job.to_string(),
                        dependency: producer.to_string(),
                    })?;
            match value {
                InputValue::Output(r) if producer_contract.output(r.name()).is_none() => {
                    return Err(GraphError::UndeclaredOutput {
                        job: producer.to_string(),
                        output: r.name().to_string(),
                    });
                }
                InputValue::Artifact(r) if !producer_contract.has_artifact(r.name()) => {
                    return Err(GraphError::UndeclaredArtifact {
                        job: producer.to_string(),
                        artifact: r.name().to_string(),
                    });
                }
                _ => {}
            }
            if !param.param_type.compatible_with(value.value_type()) {
                return Err(GraphError::TypeMismatch {
                    job: job.to_string(),
                    param: key.clone(),
                    expected: param.param_type,
                    actual: value.value_type(),
                });
            }
        }

        Ok(())
    }
}

fn validate_matrix(job: &JobId, matrix: &Matrix) -> Result<(), GraphError> {
    let invalid = |reason: String| GraphError::InvalidMatrix {
        job: job.to_string(),
        reason,
    };
    if matrix.axes.is_empty() {
        return Err(invalid("matrix has no axes".to_string()));
    }
    let mut seen = HashSet::new();
    for axis in &matrix.axes {
        if !seen.insert(axis.name.as_str()) {
            return Err(invalid(format!("axis '{}' is declared twice", axis.name)));
        }
        if axis.values.is_empty() {
            return Err(invalid(format!("axis '{}' has no values", axis.name)));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Automation
// ---------------------------------------------------------------------------

/// A named, triggerable graph. Immutable and reusable across any number of
/// renders and runs.
#[derive(Debug, Clone)]
pub struct Automation {
    name: String,
    trigger: Trigger,
    params: Vec<ParamSpec>,
    graph: Graph,
}

impl Automation {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }
}

/// Collects automation metadata, then runs the definition closure against a
/// fresh `GraphBuilder`.
#[derive(Debug, Clone)]
pub struct AutomationBuilder {
    name: String,
    trigger: Trigger,
    params: Vec<ParamSpec>,
}

impl AutomationBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            trigger: Trigger::default(),
            params: Vec::new(),
        }
    }

    pub fn trigger(mut self, trigger: serde_json::Value) -> Self {
        self.trigger = Trigger(trigger);
        self
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn build<F>(self, mode: BuildMode, define: F) -> Result<Automation, GraphError>
    where
        F: FnOnce(&mut GraphBuilder) -> Result<(), GraphError>,
    {
        let mut graph = GraphBuilder::new(mode);
        define(&mut graph)?;
        Ok(self.finish(graph))
    }

    /// Wrap an already populated builder.
    pub fn finish(self, graph: GraphBuilder) -> Automation {
        Automation {
            name: self.name,
            trigger: self.trigger,
            params: self.params,
            graph: graph.finish(),
        }
    }
}
