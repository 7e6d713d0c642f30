//! Jobs, the references that wire them together, and matrix declarations.
//!
//! A reference (`JobOutputRef` / `ArtifactRef`) doubles as a value
//! placeholder and as a dependency edge: holding one as a job input is the
//! only way a dependency is inferred.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::contract::{ParamType, TaskContract};
use crate::expression::Expression;
use crate::literal::Literal;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Unique job name within a graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

/// Handle to a declared output of another job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobOutputRef {
    job: JobId,
    name: String,
    output_type: ParamType,
}

impl JobOutputRef {
    /// Build a reference. Callers outside the graph builder should obtain
    /// references through `JobHandle::output`, which validates the name.
    pub fn new(job: JobId, name: impl Into<String>, output_type: ParamType) -> Self {
        Self {
            job,
            name: name.into(),
            output_type,
        }
    }

    pub fn job(&self) -> &JobId {
        &self.job
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn output_type(&self) -> ParamType {
        self.output_type
    }
}

/// Handle to a declared artifact of another job. Always typed as a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactRef {
    job: JobId,
    name: String,
}

impl ArtifactRef {
    pub fn new(job: JobId, name: impl Into<String>) -> Self {
        Self {
            job,
            name: name.into(),
        }
    }

    pub fn job(&self) -> &JobId {
        &self.job
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> ParamType {
        ParamType::Path
    }
}

/// A job input: a literal, or a reference that must be resolved before the
/// job runs.
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    Literal(Literal),
    Output(JobOutputRef),
    Artifact(ArtifactRef),
}

impl InputValue {
    /// The producing job, if this input is a reference.
    pub fn producer(&self) -> Option<&JobId> {
        match self {
            InputValue::Literal(_) => None,
            InputValue::Output(r) => Some(r.job()),
            InputValue::Artifact(r) => Some(r.job()),
        }
    }

    pub fn value_type(&self) -> ParamType {
        match self {
            InputValue::Literal(lit) => lit.param_type(),
            InputValue::Output(r) => r.output_type(),
            InputValue::Artifact(r) => r.value_type(),
        }
    }
}

impl From<Literal> for InputValue {
    fn from(value: Literal) -> Self {
        InputValue::Literal(value)
    }
}

impl From<JobOutputRef> for InputValue {
    fn from(value: JobOutputRef) -> Self {
        InputValue::Output(value)
    }
}

impl From<ArtifactRef> for InputValue {
    fn from(value: ArtifactRef) -> Self {
        InputValue::Artifact(value)
    }
}

impl From<&str> for InputValue {
    fn from(value: &str) -> Self {
        InputValue::Literal(Literal::from(value))
    }
}

impl From<String> for InputValue {
    fn from(value: String) -> Self {
        InputValue::Literal(Literal::from(value))
    }
}

impl From<bool> for InputValue {
    fn from(value: bool) -> Self {
        InputValue::Literal(Literal::from(value))
    }
}

impl From<i64> for InputValue {
    fn from(value: i64) -> Self {
        InputValue::Literal(Literal::from(value))
    }
}

impl From<f64> for InputValue {
    fn from(value: f64) -> Self {
        InputValue::Literal(Literal::from(value))
    }
}

// ---------------------------------------------------------------------------
// Matrix
// ---------------------------------------------------------------------------

/// One matrix axis and its values.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixAxis {
    pub name: String,
    pub values: Vec<Literal>,
}

/// Ordered set of axes. Serialized as a mapping in axis order:
///
/// ```yaml
/// matrix:
///   os: [linux, macos]
///   python: ["3.11", "3.12"]
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Matrix {
    pub axes: Vec<MatrixAxis>,
}

impl Matrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn axis<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Literal>,
    {
        self.axes.push(MatrixAxis {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Number of combinations the matrix expands into.
    pub fn combinations(&self) -> usize {
        if self.axes.is_empty() {
            return 0;
        }
        self.axes.iter().map(|a| a.values.len()).product()
    }
}

impl Serialize for Matrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.axes.len()))?;
        for axis in &self.axes {
            map.serialize_entry(&axis.name, &axis.values)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Matrix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MatrixVisitor;

        impl<'de> Visitor<'de> for MatrixVisitor {
            type Value = Matrix;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of axis name to a list of values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Matrix, A::Error> {
                let mut axes = Vec::new();
                while let Some((name, values)) = access.next_entry::<String, Vec<Literal>>()? {
                    axes.push(MatrixAxis { name, values });
                }
                Ok(Matrix { axes })
            }
        }

        deserializer.deserialize_map(MatrixVisitor)
    }
}

/// The axis assignment of one expanded matrix unit.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixInstance {
    /// Name of the unexpanded job this unit came from.
    pub group: JobId,
    pub assignment: Vec<(String, Literal)>,
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// One schedulable unit wrapping a task invocation with concrete inputs.
///
/// Created once by the graph builder and never mutated afterward.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub contract: Arc<TaskContract>,
    /// Bindings keyed by parameter name; a subset of the contract's params.
    pub inputs: BTreeMap<String, InputValue>,
    /// Explicitly requested dependencies.
    pub needs: Vec<JobId>,
    pub condition: Option<Expression>,
    /// Unexpanded matrix (generate mode only).
    pub matrix: Option<Matrix>,
    pub runs_on: Option<String>,
    /// Set on units produced by local-mode matrix expansion.
    pub instance: Option<MatrixInstance>,
}

impl Job {
    pub fn task(&self) -> &str {
        &self.contract.name
    }

    /// Producers referenced by this job's inputs, in parameter order.
    pub fn referenced_producers(&self) -> impl Iterator<Item = &JobId> {
        self.inputs.values().filter_map(InputValue::producer)
    }
}
