//! Task contracts: the externally-owned declaration of what a task accepts
//! and produces.
//!
//! A `TaskContract` is consumed, never owned, by the graph builder. It names
//! the task, its ordered parameters, and the outputs, artifacts and secrets
//! the task declares. Contracts are immutable once registered and are shared
//! as `Arc<TaskContract>`.

use serde::{Deserialize, Serialize};

use crate::literal::Literal;

// ---------------------------------------------------------------------------
// Parameter types
// ---------------------------------------------------------------------------

/// The declared type of a parameter or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Float,
    Boolean,
    Path,
    #[default]
    Any,
}

impl ParamType {
    /// Whether a literal may be bound to a parameter of this type.
    pub fn accepts(self, literal: &Literal) -> bool {
        self.compatible_with(literal.param_type())
    }

    /// Whether a value tagged `other` may flow into a slot of this type.
    ///
    /// `Any` on either side always matches. Integers widen to floats and
    /// strings may name paths.
    pub fn compatible_with(self, other: ParamType) -> bool {
        match (self, other) {
            (ParamType::Any, _) | (_, ParamType::Any) => true,
            (ParamType::Float, ParamType::Integer) => true,
            (ParamType::Path, ParamType::String) => true,
            (a, b) => a == b,
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Float => "float",
            ParamType::Boolean => "boolean",
            ParamType::Path => "path",
            ParamType::Any => "any",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// A declared parameter of a task or an automation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub param_type: ParamType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Literal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            default: None,
            description: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<Literal>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// A named output a task writes to its output channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub output_type: ParamType,
}

/// The declaration of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskContract {
    /// Task name, also the default job name and the command-line verb.
    pub name: String,
    /// Ordered parameter list; order drives command-line argument order.
    #[serde(default)]
    pub params: Vec<ParamSpec>,
    #[serde(default)]
    pub outputs: Vec<OutputSpec>,
    #[serde(default)]
    pub artifacts: Vec<String>,
    /// Secret names injected into the job environment at run time.
    #[serde(default)]
    pub secrets: Vec<String>,
}

impl TaskContract {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            outputs: Vec::new(),
            artifacts: Vec::new(),
            secrets: Vec::new(),
        }
    }

    pub fn with_param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn with_output(mut self, name: impl Into<String>, output_type: ParamType) -> Self {
        self.outputs.push(OutputSpec {
            name: name.into(),
            output_type,
        });
        self
    }

    pub fn with_artifact(mut self, name: impl Into<String>) -> Self {
        self.artifacts.push(name.into());
        self
    }

    pub fn with_secret(mut self, name: impl Into<String>) -> Self {
        self.secrets.push(name.into());
        self
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&OutputSpec> {
        self.outputs.iter().find(|o| o.name == name)
    }

    pub fn has_artifact(&self, name: &str) -> bool {
        self.artifacts.iter().any(|a| a == name)
    }
}
