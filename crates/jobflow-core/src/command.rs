//! Task command lines.
//!
//! A job runs as `<entry point...> <task> --<param>=<value> ...`, parameters
//! in contract order, bound inputs only. The same template serves the
//! generated document (references left as CI placeholders) and the local
//! executor (references replaced by recorded values), so both show the same
//! text for the same job.

use std::collections::BTreeMap;
use std::path::Path;

use jobflow_types::job::{InputValue, Job, JobId};

#[derive(Debug, Clone, PartialEq)]
enum Argument {
    Fixed(String),
    Value { param: String, value: String },
    Output { param: String, job: JobId, name: String },
    Artifact { param: String, path: String },
}

/// The argv of one job, with reference slots still open.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandTemplate {
    args: Vec<Argument>,
}

impl CommandTemplate {
    pub fn for_job(job: &Job, entry_point: &[String], artifact_dir: &Path) -> Self {
        let mut args: Vec<Argument> = entry_point
            .iter()
            .cloned()
            .map(Argument::Fixed)
            .collect();
        args.push(Argument::Fixed(job.task().to_string()));

        for spec in &job.contract.params {
            let Some(value) = job.inputs.get(&spec.name) else {
                continue;
            };
            let param = spec.name.clone();
            args.push(match value {
                InputValue::Literal(lit) => Argument::Value {
                    param,
                    value: lit.to_string(),
                },
                InputValue::Output(r) => Argument::Output {
                    param,
                    job: r.job().clone(),
                    name: r.name().to_string(),
                },
                InputValue::Artifact(r) => Argument::Artifact {
                    param,
                    path: artifact_path(artifact_dir, r.job().as_str(), r.name()),
                },
            });
        }

        Self { args }
    }

    /// Argv with output references as `${{ needs.<job>.outputs.<name> }}`.
    pub fn render_for_document(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| match arg {
                Argument::Fixed(s) => s.clone(),
                Argument::Value { param, value } => flag(param, value),
                Argument::Output { param, job, name } => {
                    flag(param, &format!("${{{{ needs.{job}.outputs.{name} }}}}"))
                }
                Argument::Artifact { param, path } => flag(param, path),
            })
            .collect()
    }

    /// Argv with every reference slot filled from `resolved`, keyed by
    /// parameter name. Parameters bound to artifact references keep the
    /// template path unless `resolved` overrides it. Returns `None` when an
    /// output slot has no value.
    pub fn resolve(&self, resolved: &BTreeMap<String, String>) -> Option<Vec<String>> {
        self.args
            .iter()
            .map(|arg| match arg {
                Argument::Fixed(s) => Some(s.clone()),
                Argument::Value { param, value } => Some(flag(param, value)),
                Argument::Output { param, .. } => resolved.get(param).map(|v| flag(param, v)),
                Argument::Artifact { param, path } => Some(flag(
                    param,
                    resolved.get(param).map(String::as_str).unwrap_or(path),
                )),
            })
            .collect()
    }
}

fn flag(param: &str, value: &str) -> String {
    format!("--{param}={value}")
}

/// Relative location of a job's artifact: `<artifact_dir>/<job>/<name>`.
pub fn artifact_path(artifact_dir: &Path, job: &str, name: &str) -> String {
    let root = artifact_dir.to_string_lossy();
    let root = root.trim_end_matches('/');
    if root.is_empty() {
        format!("{job}/{name}")
    } else {
        format!("{root}/{job}/{name}")
    }
}

/// Join argv into one shell-safe line, single-quoting arguments that need it.
pub fn display_command(argv: &[String]) -> String {
    argv.iter()
        .map(|arg| quote(arg))
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,@%+".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
