//! Condition expression tree.
//!
//! Leaves are parameter references, context references and literals;
//! operators are `Eq`, `Ne`, `Not`, `And` and `Or`. The tree is immutable
//! and structurally comparable. Evaluation and rendering live in
//! `jobflow-core`; the operator impls (`!`, `&`, `|`) live here because they
//! must sit next to the type.

use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

use serde::{Deserialize, Serialize};

use crate::literal::Literal;

/// A boolean-valued condition over parameters and context.
///
/// Serialized externally tagged, e.g.
/// `{ eq: [{ param: env }, { literal: prod }] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    /// A declared automation parameter.
    Param(String),
    /// An external context value such as `github.ref_name`.
    Context(String),
    Literal(Literal),
    Eq(Box<Expression>, Box<Expression>),
    Ne(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
}

/// Identity of an expression leaf that must be bound in an environment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum RefIdentity {
    Param(String),
    Context(String),
}

impl fmt::Display for RefIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefIdentity::Param(name) => write!(f, "param '{name}'"),
            RefIdentity::Context(path) => write!(f, "context '{path}'"),
        }
    }
}

impl Not for Expression {
    type Output = Expression;

    fn not(self) -> Expression {
        Expression::Not(Box::new(self))
    }
}

impl BitAnd for Expression {
    type Output = Expression;

    fn bitand(self, rhs: Expression) -> Expression {
        Expression::And(Box::new(self), Box::new(rhs))
    }
}

impl BitOr for Expression {
    type Output = Expression;

    fn bitor(self, rhs: Expression) -> Expression {
        Expression::Or(Box::new(self), Box::new(rhs))
    }
}
