//! Local executor: wave-based parallel execution of a job graph.
//!
//! The `LocalExecutor` processes jobs in dependency waves. Jobs within a
//! wave run concurrently via `tokio::task::JoinSet`, one subprocess each,
//! and the scheduler waits for the whole wave before computing the next.
//!
//! # Execution flow
//!
//! 1. Pre-flight: reject unexpanded matrices, evaluate every condition.
//! 2. Compute the next wave from the current job states.
//! 3. For each wave member, on the scheduling task: apply its condition
//!    verdict, resolve references and secrets, prepare the output channel.
//! 4. Spawn every prepared member; record each result as it completes.
//! 5. If any member failed, stop; otherwise go to 2.
//!
//! - `plan` -- ready-set and static wave computation
//! - `outputs` -- output channel parsing

pub mod outputs;
pub mod plan;

pub use plan::{plan_waves, ready_jobs};

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use jobflow_types::config::GlobalConfig;
use jobflow_types::event::ExecutorEvent;
use jobflow_types::job::{InputValue, Job, JobId};
use jobflow_types::run::{JobRecord, JobState, RunReport, RunStatus, SkipReason};
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::command::{CommandTemplate, artifact_path, display_command};
use crate::event::EventBus;
use crate::expression::{self, Environment, ExpressionError};
use crate::graph::{Automation, Graph};
use crate::runner::{CommandOutput, CommandRunner, Invocation, RunnerError};
use crate::secret::SecretProvider;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// File the job writes its outputs to.
pub const ENV_OUTPUT_FILE: &str = "JOBFLOW_OUTPUT_FILE";

/// Directory the job writes its declared artifacts to.
pub const ENV_ARTIFACT_DIR: &str = "JOBFLOW_ARTIFACT_DIR";

pub const ENV_JOB: &str = "JOBFLOW_JOB";

pub const ENV_RUN_ID: &str = "JOBFLOW_RUN_ID";

// ---------------------------------------------------------------------------
// Options and errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    pub entry_point: Vec<String>,
    /// Directory every job runs in.
    pub working_dir: PathBuf,
    /// Artifact root, relative to `working_dir`.
    pub artifact_dir: PathBuf,
}

impl ExecutorOptions {
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self {
            entry_point: config.entry_point.clone(),
            working_dir: config
                .working_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(".")),
            artifact_dir: config.artifact_dir.clone(),
        }
    }
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self::from_config(&GlobalConfig::default())
    }
}

/// Errors that abort a run as a whole. Per-job failures are recorded in the
/// report instead.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("condition error: {0}")]
    Expression(#[from] ExpressionError),

    #[error("job '{0}' has an unexpanded matrix; build the automation in local mode")]
    UnexpandedMatrix(String),

    #[error("failed to prepare run: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Per-job preparation
// ---------------------------------------------------------------------------

/// A wave member ready to spawn.
struct Prepared {
    pos: usize,
    invocation: Invocation,
    output_file: PathBuf,
    artifact_dir: PathBuf,
}

enum Preparation {
    Ready(Prepared),
    Skipped(SkipReason),
    Failed(String),
}

enum Resolution {
    Value(String),
    Skip(SkipReason),
    Fail(String),
}

#[derive(Clone, Copy)]
enum RefKind {
    Output,
    Artifact,
}

// ---------------------------------------------------------------------------
// LocalExecutor
// ---------------------------------------------------------------------------

/// Runs an automation on the local host.
///
/// Generic over the command runner and the secret provider so tests can
/// substitute scripted collaborators.
pub struct LocalExecutor<C, S> {
    runner: Arc<C>,
    secrets: S,
    options: ExecutorOptions,
    event_bus: EventBus,
}

impl<C, S> LocalExecutor<C, S>
where
    C: CommandRunner + 'static,
    S: SecretProvider,
{
    pub fn new(runner: Arc<C>, secrets: S, options: ExecutorOptions, event_bus: EventBus) -> Self {
        Self {
            runner,
            secrets,
            options,
            event_bus,
        }
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Execute every job of `automation` whose dependencies allow it.
    ///
    /// `env` binds condition leaves; automation parameter defaults are bound
    /// underneath it. Returns `Err` only for problems that prevent the run
    /// as a whole; job failures are reported in the `RunReport`.
    pub async fn execute(
        &self,
        automation: &Automation,
        env: &Environment,
    ) -> Result<RunReport, ExecutorError> {
        let graph = automation.graph();
        if let Some(job) = graph.jobs().iter().find(|j| j.matrix.is_some()) {
            return Err(ExecutorError::UnexpandedMatrix(job.id.to_string()));
        }

        let base = base_environment(automation, env);
        let envs: Vec<Environment> = graph
            .jobs()
            .iter()
            .map(|job| job_environment(&base, job))
            .collect();
        let verdicts = preflight(graph, &envs)?;

        let run_id = Uuid::now_v7();
        let started_at = Utc::now();
        let run_start = Instant::now();
        let channel_dir = tempfile::Builder::new().prefix("jobflow-").tempdir()?;

        let mut records: Vec<JobRecord> = graph
            .jobs()
            .iter()
            .map(|job| JobRecord::pending(job.id.clone(), job.task()))
            .collect();

        self.event_bus.publish(ExecutorEvent::RunStarted {
            run_id,
            automation: automation.name().to_string(),
            total_jobs: graph.len(),
        });

        tracing::info!(
            run_id = %run_id,
            automation = automation.name(),
            jobs = graph.len(),
            "starting local run"
        );

        let mut wave = 0;
        loop {
            let states: Vec<JobState> = records.iter().map(|r| r.state).collect();
            let ready = plan::ready_jobs(graph, &states);
            if ready.is_empty() {
                break;
            }

            self.event_bus.publish(ExecutorEvent::WaveStarted {
                run_id,
                wave,
                jobs: ready.iter().map(|&pos| graph.jobs()[pos].id.clone()).collect(),
            });
            tracing::debug!(run_id = %run_id, wave, jobs = ready.len(), "processing wave");

            let mut halted = false;
            let mut prepared = Vec::new();
            for &pos in &ready {
                records[pos].wave = Some(wave);
                let preparation = self
                    .prepare(graph, pos, verdicts[pos], &records, run_id, channel_dir.path())
                    .await?;
                match preparation {
                    Preparation::Ready(p) => prepared.push(p),
                    Preparation::Skipped(reason) => {
                        self.record_skip(&mut records[pos], reason, run_id);
                    }
                    Preparation::Failed(error) => {
                        self.record_failure(&mut records[pos], error, run_id);
                        halted = true;
                    }
                }
            }

            let mut join_set = JoinSet::new();
            let mut spawned = HashMap::new();
            for p in prepared {
                let record = &mut records[p.pos];
                let command = display_command(&p.invocation.argv);
                record.state = JobState::Running;
                record.started_at = Some(Utc::now());
                record.command = Some(command.clone());

                self.event_bus.publish(ExecutorEvent::JobStarted {
                    run_id,
                    job: record.job.clone(),
                    wave,
                    command,
                });

                let runner = Arc::clone(&self.runner);
                let pos = p.pos;
                let handle = join_set.spawn(async move {
                    let start = Instant::now();
                    let result = runner.run(&p.invocation).await;
                    (p, result, start.elapsed())
                });
                spawned.insert(handle.id(), pos);
            }

            // Barrier: every member finishes before the next wave is computed.
            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok((p, result, elapsed)) => {
                        let job = &graph.jobs()[p.pos];
                        let succeeded = self
                            .record_finish(job, &mut records[p.pos], &p, result, elapsed, run_id)
                            .await;
                        if !succeeded {
                            halted = true;
                        }
                    }
                    Err(e) => {
                        let job = spawned.get(&e.id()).map(|&pos| graph.jobs()[pos].id.as_str());
                        tracing::error!(run_id = %run_id, job, error = %e, "job task did not complete");
                    }
                }
            }

            for &pos in &ready {
                if records[pos].state == JobState::Running {
                    self.record_failure(
                        &mut records[pos],
                        "job task panicked before reporting a result".to_string(),
                        run_id,
                    );
                    halted = true;
                }
            }

            wave += 1;
            if halted {
                tracing::warn!(run_id = %run_id, wave = wave - 1, "wave failed; no further waves will start");
                break;
            }
        }

        let status = if records
            .iter()
            .all(|r| matches!(r.state, JobState::Succeeded | JobState::Skipped))
        {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        };
        let duration_ms = run_start.elapsed().as_millis() as u64;

        self.event_bus.publish(ExecutorEvent::RunFinished {
            run_id,
            status,
            duration_ms,
        });

        tracing::info!(
            run_id = %run_id,
            automation = automation.name(),
            status = ?status,
            waves = wave,
            duration_ms,
            "local run finished"
        );

        Ok(RunReport {
            run_id,
            automation: automation.name().to_string(),
            status,
            waves: wave,
            started_at,
            duration_ms,
            jobs: records,
        })
    }

    /// Everything that happens on the scheduling task before a job spawns.
    async fn prepare(
        &self,
        graph: &Graph,
        pos: usize,
        condition_holds: bool,
        records: &[JobRecord],
        run_id: Uuid,
        channel_dir: &Path,
    ) -> Result<Preparation, ExecutorError> {
        let job = &graph.jobs()[pos];

        if !condition_holds {
            return Ok(Preparation::Skipped(SkipReason::ConditionFalse));
        }

        let mut resolved = BTreeMap::new();
        for (param, value) in &job.inputs {
            let resolution = match value {
                InputValue::Literal(_) => continue,
                InputValue::Output(r) => {
                    self.resolve_reference(graph, records, r.job(), r.name(), RefKind::Output)
                }
                InputValue::Artifact(r) => {
                    self.resolve_reference(graph, records, r.job(), r.name(), RefKind::Artifact)
                }
            };
            match resolution {
                Resolution::Value(v) => {
                    resolved.insert(param.clone(), v);
                }
                Resolution::Skip(reason) => return Ok(Preparation::Skipped(reason)),
                Resolution::Fail(error) => return Ok(Preparation::Failed(error)),
            }
        }

        let template =
            CommandTemplate::for_job(job, &self.options.entry_point, &self.options.artifact_dir);
        let Some(argv) = template.resolve(&resolved) else {
            return Ok(Preparation::Failed(
                "command line has an unresolved argument".to_string(),
            ));
        };

        let mut env_vars = BTreeMap::new();
        for secret in &job.contract.secrets {
            match self.secrets.get(secret).await {
                Ok(Some(value)) => {
                    env_vars.insert(secret.clone(), value);
                }
                Ok(None) => {
                    return Ok(Preparation::Failed(format!(
                        "secret '{secret}' is not available"
                    )));
                }
                Err(e) => {
                    return Ok(Preparation::Failed(format!("secret '{secret}': {e}")));
                }
            }
        }

        let artifact_dir = self
            .options
            .working_dir
            .join(&self.options.artifact_dir)
            .join(job.id.as_str());
        if let Err(e) = tokio::fs::create_dir_all(&artifact_dir).await {
            return Ok(Preparation::Failed(format!(
                "failed to create artifact directory {}: {e}",
                artifact_dir.display()
            )));
        }

        let output_file = channel_dir.join(format!("{pos}.out"));
        if let Err(e) = tokio::fs::write(&output_file, b"").await {
            return Ok(Preparation::Failed(format!(
                "failed to create output file {}: {e}",
                output_file.display()
            )));
        }

        env_vars.insert(ENV_OUTPUT_FILE.to_string(), output_file.display().to_string());
        env_vars.insert(ENV_ARTIFACT_DIR.to_string(), artifact_dir.display().to_string());
        env_vars.insert(ENV_JOB.to_string(), job.id.to_string());
        env_vars.insert(ENV_RUN_ID.to_string(), run_id.to_string());

        Ok(Preparation::Ready(Prepared {
            pos,
            invocation: Invocation {
                argv,
                working_dir: self.options.working_dir.clone(),
                env: env_vars,
            },
            output_file,
            artifact_dir,
        }))
    }

    /// Look a reference up in the recorded results of its producer. A
    /// local-mode matrix group resolves from its last instance, in
    /// declaration order, that recorded the value.
    fn resolve_reference(
        &self,
        graph: &Graph,
        records: &[JobRecord],
        producer: &JobId,
        name: &str,
        kind: RefKind,
    ) -> Resolution {
        let instances = graph.instances(producer);
        let candidates: Vec<usize> = if instances.is_empty() {
            graph.position(producer).into_iter().collect()
        } else {
            instances.iter().filter_map(|id| graph.position(id)).collect()
        };

        let mut producer_succeeded = false;
        for &pos in candidates.iter().rev() {
            let record = &records[pos];
            if record.state != JobState::Succeeded {
                continue;
            }
            producer_succeeded = true;
            match kind {
                RefKind::Output => {
                    if let Some(value) = record.outputs.get(name) {
                        return Resolution::Value(value.clone());
                    }
                }
                RefKind::Artifact => {
                    if record.artifacts.contains_key(name) {
                        return Resolution::Value(artifact_path(
                            &self.options.artifact_dir,
                            record.job.as_str(),
                            name,
                        ));
                    }
                }
            }
        }

        if producer_succeeded {
            let what = match kind {
                RefKind::Output => "output",
                RefKind::Artifact => "artifact",
            };
            Resolution::Fail(format!(
                "job '{producer}' succeeded without recording {what} '{name}'"
            ))
        } else {
            Resolution::Skip(SkipReason::UnresolvedInput {
                producer: producer.clone(),
                name: name.to_string(),
            })
        }
    }

    fn record_skip(&self, record: &mut JobRecord, reason: SkipReason, run_id: Uuid) {
        tracing::debug!(run_id = %run_id, job = %record.job, reason = %reason, "skipping job");
        record.state = JobState::Skipped;
        record.skip_reason = Some(reason.clone());
        self.event_bus.publish(ExecutorEvent::JobSkipped {
            run_id,
            job: record.job.clone(),
            reason,
        });
    }

    fn record_failure(&self, record: &mut JobRecord, error: String, run_id: Uuid) {
        tracing::warn!(run_id = %run_id, job = %record.job, error = error.as_str(), "job failed");
        record.state = JobState::Failed;
        record.error = Some(error);
        self.event_bus.publish(ExecutorEvent::JobFinished {
            run_id,
            job: record.job.clone(),
            state: JobState::Failed,
            duration_ms: record.duration_ms.unwrap_or(0),
            exit_code: record.exit_code,
        });
    }

    /// Record a finished subprocess. Returns whether the job succeeded.
    async fn record_finish(
        &self,
        job: &Job,
        record: &mut JobRecord,
        prepared: &Prepared,
        result: Result<CommandOutput, RunnerError>,
        elapsed: Duration,
        run_id: Uuid,
    ) -> bool {
        record.duration_ms = Some(elapsed.as_millis() as u64);

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                self.record_failure(record, e.to_string(), run_id);
                return false;
            }
        };

        let success = output.success();
        record.exit_code = output.exit_code;
        record.stdout = output.stdout;
        record.stderr = output.stderr;

        if !success {
            let error = match output.exit_code {
                Some(code) => format!("exited with code {code}"),
                None => "terminated by signal".to_string(),
            };
            self.record_failure(record, error, run_id);
            return false;
        }

        record.outputs = read_outputs(&prepared.output_file, job).await;
        record.artifacts = collect_artifacts(&prepared.artifact_dir, job).await;
        record.state = JobState::Succeeded;

        tracing::info!(
            run_id = %run_id,
            job = %record.job,
            duration_ms = record.duration_ms.unwrap_or(0),
            outputs = record.outputs.len(),
            "job succeeded"
        );

        self.event_bus.publish(ExecutorEvent::JobFinished {
            run_id,
            job: record.job.clone(),
            state: JobState::Succeeded,
            duration_ms: record.duration_ms.unwrap_or(0),
            exit_code: record.exit_code,
        });
        true
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parameter defaults, overlaid with the caller's bindings.
fn base_environment(automation: &Automation, env: &Environment) -> Environment {
    let mut base = Environment::new();
    for param in automation.params() {
        if let Some(default) = &param.default {
            base.bind_param(param.name.clone(), default.clone());
        }
    }
    base.extend(env);
    base
}

/// The base environment plus `matrix.<axis>` for a matrix instance.
fn job_environment(base: &Environment, job: &Job) -> Environment {
    let mut env = base.clone();
    if let Some(instance) = &job.instance {
        for (axis, value) in &instance.assignment {
            env.bind_context(format!("matrix.{axis}"), value.clone());
        }
    }
    env
}

/// Evaluate every condition before anything runs.
///
/// Condition environments never change during a run, so the verdicts hold
/// for the whole run. `true` for jobs without a condition.
fn preflight(graph: &Graph, envs: &[Environment]) -> Result<Vec<bool>, ExecutorError> {
    graph
        .jobs()
        .iter()
        .zip(envs)
        .map(|(job, env)| {
            let Some(condition) = &job.condition else {
                return Ok(true);
            };
            if let Some(leaf) = expression::references(condition)
                .into_iter()
                .find(|leaf| !env.contains(leaf))
            {
                tracing::error!(job = %job.id, missing = %leaf, "condition references an unbound value");
                return Err(ExpressionError::MissingBinding(leaf).into());
            }
            expression::evaluate(condition, env).map_err(|e| {
                tracing::error!(job = %job.id, error = %e, "condition cannot be evaluated");
                ExecutorError::from(e)
            })
        })
        .collect()
}

async fn read_outputs(path: &Path, job: &Job) -> BTreeMap<String, String> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => outputs::parse_outputs(&content, &job.contract, job.id.as_str()),
        Err(e) => {
            tracing::warn!(job = %job.id, error = %e, "could not read output file");
            BTreeMap::new()
        }
    }
}

async fn collect_artifacts(dir: &Path, job: &Job) -> BTreeMap<String, PathBuf> {
    let mut artifacts = BTreeMap::new();
    for name in &job.contract.artifacts {
        let path = dir.join(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            artifacts.insert(name.clone(), path);
        } else {
            tracing::warn!(job = %job.id, artifact = name.as_str(), "declared artifact was not produced");
        }
    }
    artifacts
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use jobflow_types::contract::{ParamSpec, ParamType, TaskContract};
    use jobflow_types::error::SecretError;
    use jobflow_types::expression::RefIdentity;
    use jobflow_types::job::Matrix;
    use tempfile::TempDir;

    use super::*;
    use crate::expression::{context_ref, param_eq, param_ref};
    use crate::generator::{self, GeneratorOptions};
    use crate::graph::{AutomationBuilder, BuildMode, GraphBuilder, JobSpec};

    /// In-memory runner keyed by job name (`JOBFLOW_JOB`).
    #[derive(Default)]
    struct ScriptedRunner {
        calls: Mutex<Vec<Invocation>>,
        failing: HashSet<String>,
        panicking: HashSet<String>,
        outputs: HashMap<String, String>,
        artifacts: HashMap<String, Vec<String>>,
    }

    impl ScriptedRunner {
        fn failing(mut self, job: &str) -> Self {
            self.failing.insert(job.to_string());
            self
        }

        fn panicking(mut self, job: &str) -> Self {
            self.panicking.insert(job.to_string());
            self
        }

        fn writes(mut self, job: &str, content: &str) -> Self {
            self.outputs.insert(job.to_string(), content.to_string());
            self
        }

        fn produces(mut self, job: &str, artifact: &str) -> Self {
            self.artifacts
                .entry(job.to_string())
                .or_default()
                .push(artifact.to_string());
            self
        }

        fn calls(&self) -> Vec<Invocation> {
            self.calls.lock().unwrap().clone()
        }

        fn called_jobs(&self) -> Vec<String> {
            self.calls()
                .iter()
                .map(|i| i.env[ENV_JOB].clone())
                .collect()
        }
    }

    impl CommandRunner for ScriptedRunner {
        async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, RunnerError> {
            self.calls.lock().unwrap().push(invocation.clone());
            let job = invocation.env[ENV_JOB].clone();
            if self.panicking.contains(&job) {
                panic!("runner crashed on {job}");
            }

            if let Some(content) = self.outputs.get(&job) {
                std::fs::write(&invocation.env[ENV_OUTPUT_FILE], content)?;
            }
            for artifact in self.artifacts.get(&job).into_iter().flatten() {
                let dir = PathBuf::from(&invocation.env[ENV_ARTIFACT_DIR]);
                std::fs::write(dir.join(artifact), b"data")?;
            }

            let exit_code = if self.failing.contains(&job) { 1 } else { 0 };
            Ok(CommandOutput {
                exit_code: Some(exit_code),
                stdout: format!("ran {job}\n"),
                stderr: String::new(),
            })
        }
    }

    #[derive(Default)]
    struct StaticSecrets(HashMap<String, String>);

    impl SecretProvider for StaticSecrets {
        async fn get(&self, key: &str) -> Result<Option<String>, SecretError> {
            Ok(self.0.get(key).cloned())
        }
    }

    fn executor(
        runner: &Arc<ScriptedRunner>,
        secrets: StaticSecrets,
        dir: &TempDir,
    ) -> LocalExecutor<ScriptedRunner, StaticSecrets> {
        let options = ExecutorOptions {
            entry_point: vec!["jobflow-task".to_string()],
            working_dir: dir.path().to_path_buf(),
            artifact_dir: PathBuf::from("artifacts"),
        };
        LocalExecutor::new(Arc::clone(runner), secrets, options, EventBus::new(256))
    }

    fn task(name: &str) -> Arc<TaskContract> {
        Arc::new(TaskContract::new(name))
    }

    fn ci_pipeline() -> Automation {
        AutomationBuilder::new("ci")
            .build(BuildMode::Local, |g| {
                let lint = g.declare_job(JobSpec::new(task("lint")))?;
                let fmt = g.declare_job(JobSpec::new(task("format_check")))?;
                g.declare_job(JobSpec::new(task("test")).needs(&lint).needs(&fmt))?;
                Ok(())
            })
            .unwrap()
    }

    fn release_pipeline() -> Automation {
        let build = Arc::new(
            TaskContract::new("build")
                .with_output("version", ParamType::String)
                .with_artifact("wheel"),
        );
        let publish = Arc::new(
            TaskContract::new("publish")
                .with_param(ParamSpec::new("version", ParamType::String))
                .with_param(ParamSpec::new("package", ParamType::Path)),
        );
        AutomationBuilder::new("release")
            .build(BuildMode::Local, |g| {
                let b = g.declare_job(JobSpec::new(build))?;
                g.declare_job(
                    JobSpec::new(publish)
                        .input("version", b.output("version")?)
                        .input("package", b.artifact("wheel")?),
                )?;
                Ok(())
            })
            .unwrap()
    }

    #[tokio::test]
    async fn scenario_a_independent_jobs_share_first_wave() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::default());
        let report = executor(&runner, StaticSecrets::default(), &dir)
            .execute(&ci_pipeline(), &Environment::new())
            .await
            .unwrap();

        assert!(report.succeeded());
        assert_eq!(report.waves, 2);
        assert_eq!(report.job("lint").unwrap().wave, Some(0));
        assert_eq!(report.job("format_check").unwrap().wave, Some(0));
        assert_eq!(report.job("test").unwrap().wave, Some(1));
        assert_eq!(
            report.job("lint").unwrap().command.as_deref(),
            Some("jobflow-task lint")
        );
    }

    #[tokio::test]
    async fn scenario_a_failed_wave_halts_progression() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::default().failing("lint"));
        let report = executor(&runner, StaticSecrets::default(), &dir)
            .execute(&ci_pipeline(), &Environment::new())
            .await
            .unwrap();

        assert!(!report.succeeded());
        assert_eq!(report.job("lint").unwrap().state, JobState::Failed);
        assert_eq!(report.job("lint").unwrap().exit_code, Some(1));
        assert_eq!(report.job("format_check").unwrap().state, JobState::Succeeded);
        assert_eq!(report.job("test").unwrap().state, JobState::Pending);
        let not_attempted: Vec<&str> = report.not_attempted().map(|r| r.job.as_str()).collect();
        assert_eq!(not_attempted, vec!["test"]);
        assert_eq!(report.waves, 1);
        assert!(!runner.called_jobs().contains(&"test".to_string()));
    }

    #[tokio::test]
    async fn scenario_b_output_and_artifact_propagate() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(
            ScriptedRunner::default()
                .writes("build", "version=1.4.0\n")
                .produces("build", "wheel"),
        );
        let automation = release_pipeline();
        let edges = automation.graph().edges();
        assert_eq!(edges, vec![(JobId::from("build"), JobId::from("publish"))]);

        let report = executor(&runner, StaticSecrets::default(), &dir)
            .execute(&automation, &Environment::new())
            .await
            .unwrap();

        assert!(report.succeeded());
        let build = report.job("build").unwrap();
        assert_eq!(build.outputs.get("version").map(String::as_str), Some("1.4.0"));
        assert_eq!(
            build.artifacts.get("wheel"),
            Some(&dir.path().join("artifacts").join("build").join("wheel"))
        );

        let publish = runner.calls().into_iter().find(|i| i.argv[1] == "publish").unwrap();
        assert_eq!(
            publish.argv,
            vec![
                "jobflow-task",
                "publish",
                "--version=1.4.0",
                "--package=artifacts/build/wheel",
            ]
        );
        assert_eq!(publish.working_dir, dir.path());
    }

    #[tokio::test]
    async fn scenario_c_false_condition_skips_without_spawning() {
        let deploy = Arc::new(TaskContract::new("deploy"));
        let automation = AutomationBuilder::new("deploy")
            .param(ParamSpec::new("env", ParamType::String).with_default("dev"))
            .build(BuildMode::Local, |g| {
                g.declare_job(
                    JobSpec::new(deploy).condition(param_eq(param_ref("env"), "prod")),
                )?;
                Ok(())
            })
            .unwrap();

        let dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::default());
        let exec = executor(&runner, StaticSecrets::default(), &dir);

        let mut env = Environment::new();
        env.bind_param("env", "staging");
        let report = exec.execute(&automation, &env).await.unwrap();
        let deploy = report.job("deploy").unwrap();
        assert_eq!(deploy.state, JobState::Skipped);
        assert_eq!(deploy.skip_reason, Some(SkipReason::ConditionFalse));
        assert!(deploy.command.is_none());
        assert!(runner.calls().is_empty());
        assert!(report.succeeded());

        // Parameter defaults bind when the caller does not.
        let report = exec.execute(&automation, &Environment::new()).await.unwrap();
        assert_eq!(report.job("deploy").unwrap().state, JobState::Skipped);

        env.bind_param("env", "prod");
        let report = exec.execute(&automation, &env).await.unwrap();
        assert_eq!(report.job("deploy").unwrap().state, JobState::Succeeded);
    }

    #[tokio::test]
    async fn scenario_d_matrix_instances_share_dependencies() {
        let automation = AutomationBuilder::new("matrix")
            .build(BuildMode::Local, |g| {
                let setup = g.declare_job(JobSpec::new(task("setup")))?;
                g.declare_job(
                    JobSpec::new(task("job"))
                        .needs(&setup)
                        .matrix(Matrix::new().axis("os", ["a", "b"])),
                )?;
                Ok(())
            })
            .unwrap();
        let graph = automation.graph();
        for id in ["job[os=a]", "job[os=b]"] {
            assert_eq!(graph.dependencies(&JobId::from(id)), &[JobId::from("setup")]);
        }

        let dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::default());
        let report = executor(&runner, StaticSecrets::default(), &dir)
            .execute(&automation, &Environment::new())
            .await
            .unwrap();

        assert!(report.succeeded());
        assert_eq!(report.job("job[os=a]").unwrap().wave, Some(1));
        assert_eq!(report.job("job[os=b]").unwrap().wave, Some(1));
        assert_eq!(runner.calls().len(), 3);
    }

    #[tokio::test]
    async fn matrix_condition_binds_axis_context() {
        let automation = AutomationBuilder::new("matrix")
            .build(BuildMode::Local, |g| {
                g.declare_job(
                    JobSpec::new(task("test"))
                        .matrix(Matrix::new().axis("os", ["linux", "macos"]))
                        .condition(param_eq(context_ref("matrix.os"), "linux")),
                )?;
                Ok(())
            })
            .unwrap();

        let dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::default());
        let report = executor(&runner, StaticSecrets::default(), &dir)
            .execute(&automation, &Environment::new())
            .await
            .unwrap();
        assert_eq!(report.job("test[os=linux]").unwrap().state, JobState::Succeeded);
        assert_eq!(report.job("test[os=macos]").unwrap().state, JobState::Skipped);
    }

    #[tokio::test]
    async fn matrix_group_reference_resolves_from_last_instance() {
        let build = Arc::new(TaskContract::new("build").with_output("digest", ParamType::String));
        let report_task = Arc::new(
            TaskContract::new("report").with_param(ParamSpec::new("digest", ParamType::String)),
        );
        let automation = AutomationBuilder::new("matrix")
            .build(BuildMode::Local, |g| {
                let b = g.declare_job(
                    JobSpec::new(build).matrix(Matrix::new().axis("arch", ["x86", "arm"])),
                )?;
                g.declare_job(JobSpec::new(report_task).input("digest", b.output("digest")?))?;
                Ok(())
            })
            .unwrap();

        let dir = TempDir::new().unwrap();
        let runner = Arc::new(
            ScriptedRunner::default()
                .writes("build[arch=x86]", "digest=aaa\n")
                .writes("build[arch=arm]", "digest=bbb\n"),
        );
        let report = executor(&runner, StaticSecrets::default(), &dir)
            .execute(&automation, &Environment::new())
            .await
            .unwrap();

        assert!(report.succeeded());
        assert_eq!(
            report.job("report").unwrap().command.as_deref(),
            Some("jobflow-task report --digest=bbb")
        );
    }

    #[tokio::test]
    async fn skipped_producer_skips_reference_consumers_only() {
        let build = Arc::new(TaskContract::new("build").with_output("version", ParamType::String));
        let publish = Arc::new(
            TaskContract::new("publish").with_param(ParamSpec::new("version", ParamType::String)),
        );
        let automation = AutomationBuilder::new("release")
            .build(BuildMode::Local, |g| {
                let b = g.declare_job(
                    JobSpec::new(build).condition(param_eq(param_ref("release"), true)),
                )?;
                g.declare_job(JobSpec::new(publish).input("version", b.output("version")?))?;
                g.declare_job(JobSpec::new(task("notify")).needs(&b))?;
                Ok(())
            })
            .unwrap();

        let dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::default());
        let mut env = Environment::new();
        env.bind_param("release", false);
        let report = executor(&runner, StaticSecrets::default(), &dir)
            .execute(&automation, &env)
            .await
            .unwrap();

        assert!(report.succeeded());
        assert_eq!(report.job("build").unwrap().state, JobState::Skipped);
        assert_eq!(
            report.job("publish").unwrap().skip_reason,
            Some(SkipReason::UnresolvedInput {
                producer: JobId::from("build"),
                name: "version".to_string(),
            })
        );
        assert_eq!(report.job("notify").unwrap().state, JobState::Succeeded);
        assert_eq!(runner.called_jobs(), vec!["notify".to_string()]);
    }

    #[tokio::test]
    async fn missing_output_from_succeeded_producer_fails_consumer() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::default().produces("build", "wheel"));
        let report = executor(&runner, StaticSecrets::default(), &dir)
            .execute(&release_pipeline(), &Environment::new())
            .await
            .unwrap();

        assert!(!report.succeeded());
        let publish = report.job("publish").unwrap();
        assert_eq!(publish.state, JobState::Failed);
        assert!(publish.error.as_deref().unwrap().contains("output 'version'"));
        assert_eq!(runner.called_jobs(), vec!["build".to_string()]);
    }

    #[tokio::test]
    async fn secrets_are_injected_or_fail_the_job() {
        let publish = Arc::new(TaskContract::new("publish").with_secret("PYPI_TOKEN"));
        let automation = AutomationBuilder::new("release")
            .build(BuildMode::Local, |g| {
                g.declare_job(JobSpec::new(publish))?;
                Ok(())
            })
            .unwrap();

        let dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::default());
        let report = executor(&runner, StaticSecrets::default(), &dir)
            .execute(&automation, &Environment::new())
            .await
            .unwrap();
        assert_eq!(report.job("publish").unwrap().state, JobState::Failed);
        assert!(runner.calls().is_empty());

        let secrets = StaticSecrets(HashMap::from([(
            "PYPI_TOKEN".to_string(),
            "s3cret".to_string(),
        )]));
        let report = executor(&runner, secrets, &dir)
            .execute(&automation, &Environment::new())
            .await
            .unwrap();
        assert!(report.succeeded());
        assert_eq!(runner.calls()[0].env["PYPI_TOKEN"], "s3cret");
    }

    #[tokio::test]
    async fn unbound_condition_fails_before_any_spawn() {
        let automation = AutomationBuilder::new("ci")
            .build(BuildMode::Local, |g| {
                g.declare_job(JobSpec::new(task("lint")))?;
                g.declare_job(
                    JobSpec::new(task("deploy"))
                        .condition(param_eq(context_ref("github.ref_name"), "main")),
                )?;
                Ok(())
            })
            .unwrap();

        let dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::default());
        let err = executor(&runner, StaticSecrets::default(), &dir)
            .execute(&automation, &Environment::new())
            .await
            .unwrap_err();
        match err {
            ExecutorError::Expression(ExpressionError::MissingBinding(leaf)) => {
                assert_eq!(leaf, RefIdentity::Context("github.ref_name".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn non_boolean_condition_fails_before_any_spawn() {
        let automation = AutomationBuilder::new("ci")
            .build(BuildMode::Local, |g| {
                let build = g.declare_job(JobSpec::new(task("build")))?;
                g.declare_job(
                    JobSpec::new(task("deploy"))
                        .needs(&build)
                        .condition(param_ref("env")),
                )?;
                Ok(())
            })
            .unwrap();

        let dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::default());
        let mut env = Environment::new();
        env.bind_param("env", "prod");
        let err = executor(&runner, StaticSecrets::default(), &dir)
            .execute(&automation, &env)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExecutorError::Expression(ExpressionError::NotBoolean(ref leaf)) if leaf == "inputs.env"
        ));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn panicked_job_fails_and_halts_the_run() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::default().panicking("format_check"));
        let report = executor(&runner, StaticSecrets::default(), &dir)
            .execute(&ci_pipeline(), &Environment::new())
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.job("lint").unwrap().state, JobState::Succeeded);
        let crashed = report.job("format_check").unwrap();
        assert_eq!(crashed.state, JobState::Failed);
        assert!(crashed.error.as_deref().unwrap().contains("panicked"));
        assert_eq!(report.job("test").unwrap().state, JobState::Pending);
    }

    #[tokio::test]
    async fn unexpanded_matrix_is_rejected() {
        let mut g = GraphBuilder::new(BuildMode::Generate);
        g.declare_job(JobSpec::new(task("test")).matrix(Matrix::new().axis("os", ["a"])))
            .unwrap();
        let automation = AutomationBuilder::new("ci").finish(g);

        let dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::default());
        let err = executor(&runner, StaticSecrets::default(), &dir)
            .execute(&automation, &Environment::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::UnexpandedMatrix(job) if job == "test"));
    }

    #[tokio::test]
    async fn repeated_runs_yield_identical_states() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::default());
        let exec = executor(&runner, StaticSecrets::default(), &dir);
        let automation = ci_pipeline();

        let first = exec.execute(&automation, &Environment::new()).await.unwrap();
        let second = exec.execute(&automation, &Environment::new()).await.unwrap();

        assert_ne!(first.run_id, second.run_id);
        let states = |r: &RunReport| r.jobs.iter().map(|j| j.state).collect::<Vec<_>>();
        assert_eq!(states(&first), states(&second));
        assert!(states(&first).iter().all(|s| *s == JobState::Succeeded));
    }

    #[tokio::test]
    async fn local_command_matches_document_command() {
        let build = Arc::new(
            TaskContract::new("build")
                .with_param(ParamSpec::new("target", ParamType::String))
                .with_param(ParamSpec::new("jobs", ParamType::Integer)),
        );
        let automation = AutomationBuilder::new("ci")
            .build(BuildMode::Local, |g| {
                g.declare_job(
                    JobSpec::new(build)
                        .input("target", "release build")
                        .input("jobs", 8_i64),
                )?;
                Ok(())
            })
            .unwrap();

        let dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::default());
        let exec = executor(&runner, StaticSecrets::default(), &dir);
        let report = exec.execute(&automation, &Environment::new()).await.unwrap();

        let doc = generator::render(
            &automation,
            &GeneratorOptions {
                entry_point: exec.options().entry_point.clone(),
                artifact_dir: exec.options().artifact_dir.clone(),
                default_runs_on: None,
            },
        );
        assert_eq!(
            report.job("build").unwrap().command.as_deref(),
            Some(doc.job("build").unwrap().command.as_str())
        );
        assert_eq!(
            doc.job("build").unwrap().command,
            "jobflow-task build '--target=release build' --jobs=8"
        );
    }

    #[tokio::test]
    async fn events_follow_declaration_order() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::default());
        let exec = executor(&runner, StaticSecrets::default(), &dir);
        let mut rx = exec.event_bus().subscribe();

        exec.execute(&ci_pipeline(), &Environment::new()).await.unwrap();

        let events = crate::event::bus::drain(&mut rx);
        let started: Vec<&str> = events
            .iter()
            .filter(|e| e.kind() == "job_started")
            .filter_map(|e| e.job())
            .map(|j| j.as_str())
            .collect();
        assert_eq!(started, vec!["lint", "format_check", "test"]);
        assert_eq!(events.iter().filter(|e| e.kind() == "job_finished").count(), 3);
        assert!(matches!(
            events.last(),
            Some(ExecutorEvent::RunFinished { status: RunStatus::Succeeded, .. })
        ));
    }
}
