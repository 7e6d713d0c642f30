use thiserror::Error;

use crate::contract::ParamType;

/// Construction errors raised while declaring jobs.
///
/// All of these are detected synchronously inside `declare_job`,
/// `JobHandle::output` or `JobHandle::artifact`. They indicate a mistake in
/// the automation definition and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("job '{job}' binds unknown parameter '{param}' (task '{task}')")]
    UnknownParameter {
        job: String,
        task: String,
        param: String,
    },

    #[error("job '{job}' does not declare output '{output}'")]
    UndeclaredOutput { job: String, output: String },

    #[error("job '{job}' does not declare artifact '{artifact}'")]
    UndeclaredArtifact { job: String, artifact: String },

    #[error("job '{0}' is already declared")]
    DuplicateJob(String),

    #[error("job '{job}' depends on unknown job '{dependency}'")]
    UnknownJob { job: String, dependency: String },

    #[error("job '{job}' parameter '{param}' expects {expected}, got {actual}")]
    TypeMismatch {
        job: String,
        param: String,
        expected: ParamType,
        actual: ParamType,
    },

    #[error("job '{job}' has an invalid matrix: {reason}")]
    InvalidMatrix { job: String, reason: String },

    #[error("task '{0}' is already registered")]
    DuplicateTask(String),

    #[error("unknown task '{0}'")]
    UnknownTask(String),
}

/// Errors from secret resolution.
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret provider unavailable")]
    ProviderUnavailable,

    #[error("secret '{0}' has a non-UTF-8 value")]
    InvalidValue(String),
}
