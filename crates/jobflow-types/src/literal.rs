//! Literal values bound to parameters, environments and matrix axes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::contract::ParamType;

/// A concrete scalar value.
///
/// Untagged so that YAML/TOML scalars deserialize naturally (`true`, `42`,
/// `1.5`, `"prod"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Literal {
    /// The parameter type this literal naturally has.
    pub fn param_type(&self) -> ParamType {
        match self {
            Literal::Boolean(_) => ParamType::Boolean,
            Literal::Integer(_) => ParamType::Integer,
            Literal::Float(_) => ParamType::Float,
            Literal::String(_) => ParamType::String,
        }
    }

    /// Returns the inner bool for `Boolean` literals.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the inner string for `String` literals.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::String(s) => Some(s),
            _ => None,
        }
    }

    /// Value equality used by condition comparisons.
    ///
    /// Integers and floats compare numerically; any other pair of different
    /// kinds is unequal.
    pub fn loosely_equals(&self, other: &Literal) -> bool {
        match (self, other) {
            (Literal::Integer(a), Literal::Float(b)) | (Literal::Float(b), Literal::Integer(a)) => {
                (*a as f64) == *b
            }
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Boolean(b) => write!(f, "{b}"),
            Literal::Integer(i) => write!(f, "{i}"),
            Literal::Float(x) => write!(f, "{x}"),
            Literal::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Boolean(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Integer(value)
    }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Literal::Integer(i64::from(value))
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Float(value)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::String(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::String(value)
    }
}
