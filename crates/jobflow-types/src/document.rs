//! The external document: the structural, pre-serialization result of
//! rendering an automation for a CI system.
//!
//! A separate serialization layer turns this tree into the target system's
//! file format. Everything a unit needs to run is here: its command line,
//! dependencies, condition, placement, matrix, and the outputs, artifacts
//! and secrets it has to wire up.

use serde::{Deserialize, Serialize};

use crate::contract::ParamSpec;
use crate::job::Matrix;

/// Opaque trigger description, passed through untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trigger(pub serde_json::Value);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalDocument {
    pub name: String,
    pub trigger: Trigger,
    /// Automation-level parameters (dispatch inputs).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<ParamSpec>,
    pub jobs: Vec<DocumentJob>,
}

impl ExternalDocument {
    pub fn job(&self, name: &str) -> Option<&DocumentJob> {
        self.jobs.iter().find(|j| j.name == name)
    }
}

/// One external unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentJob {
    pub name: String,
    pub task: String,
    /// Explicit and inferred dependencies, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub needs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<Matrix>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runs_on: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<String>,
    /// Artifacts this unit uploads.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<String>,
    /// Artifacts this unit must fetch before running.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub downloads: Vec<ArtifactDownload>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<String>,
}

/// An artifact consumed by a unit, and where the command expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDownload {
    pub job: String,
    pub name: String,
    pub path: String,
}
