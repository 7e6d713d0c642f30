//! Condition algebra: builders, evaluation and rendering.
//!
//! The tree itself (`Expression`) lives in `jobflow-types`. This module adds
//! the builder functions, an `Environment` that binds parameter and context
//! leaves, `evaluate` for local runs and `render` for the CI condition
//! syntax. Nothing here rewrites a tree: `negate(negate(e))` evaluates like
//! `e` but renders as `!(!(e))`.

use std::collections::HashMap;

use jobflow_types::expression::{Expression, RefIdentity};
use jobflow_types::literal::Literal;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpressionError {
    #[error("no binding for {0}")]
    MissingBinding(RefIdentity),

    #[error("expression did not evaluate to a boolean: {0}")]
    NotBoolean(String),
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn param_ref(name: impl Into<String>) -> Expression {
    Expression::Param(name.into())
}

/// An external context value such as `github.ref_name` or `matrix.os`.
pub fn context_ref(path: impl Into<String>) -> Expression {
    Expression::Context(path.into())
}

pub fn literal(value: impl Into<Literal>) -> Expression {
    Expression::Literal(value.into())
}

pub fn param_eq(reference: Expression, value: impl Into<Literal>) -> Expression {
    Expression::Eq(Box::new(reference), Box::new(literal(value)))
}

pub fn param_ne(reference: Expression, value: impl Into<Literal>) -> Expression {
    Expression::Ne(Box::new(reference), Box::new(literal(value)))
}

pub fn negate(expr: Expression) -> Expression {
    Expression::Not(Box::new(expr))
}

pub fn and_(lhs: Expression, rhs: Expression) -> Expression {
    Expression::And(Box::new(lhs), Box::new(rhs))
}

pub fn or_(lhs: Expression, rhs: Expression) -> Expression {
    Expression::Or(Box::new(lhs), Box::new(rhs))
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Bindings for expression leaves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    bindings: HashMap<RefIdentity, Literal>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind_param(&mut self, name: impl Into<String>, value: impl Into<Literal>) -> &mut Self {
        self.bindings
            .insert(RefIdentity::Param(name.into()), value.into());
        self
    }

    pub fn bind_context(&mut self, path: impl Into<String>, value: impl Into<Literal>) -> &mut Self {
        self.bindings
            .insert(RefIdentity::Context(path.into()), value.into());
        self
    }

    /// Copy every binding from `other`, overwriting existing keys.
    pub fn extend(&mut self, other: &Environment) -> &mut Self {
        self.bindings
            .extend(other.bindings.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn get(&self, key: &RefIdentity) -> Option<&Literal> {
        self.bindings.get(key)
    }

    pub fn contains(&self, key: &RefIdentity) -> bool {
        self.bindings.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl From<HashMap<RefIdentity, Literal>> for Environment {
    fn from(bindings: HashMap<RefIdentity, Literal>) -> Self {
        Self { bindings }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Evaluate a condition. Both operands of `And`/`Or` are always evaluated,
/// so a missing binding surfaces no matter which side decides the result.
pub fn evaluate(expr: &Expression, env: &Environment) -> Result<bool, ExpressionError> {
    truth(expr, env)
}

fn truth(expr: &Expression, env: &Environment) -> Result<bool, ExpressionError> {
    value(expr, env)?
        .as_bool()
        .ok_or_else(|| ExpressionError::NotBoolean(render(expr)))
}

fn value(expr: &Expression, env: &Environment) -> Result<Literal, ExpressionError> {
    let result = match expr {
        Expression::Param(name) => lookup(env, RefIdentity::Param(name.clone()))?,
        Expression::Context(path) => lookup(env, RefIdentity::Context(path.clone()))?,
        Expression::Literal(lit) => lit.clone(),
        Expression::Eq(a, b) => Literal::Boolean(value(a, env)?.loosely_equals(&value(b, env)?)),
        Expression::Ne(a, b) => Literal::Boolean(!value(a, env)?.loosely_equals(&value(b, env)?)),
        Expression::Not(e) => Literal::Boolean(!truth(e, env)?),
        Expression::And(a, b) => {
            let lhs = truth(a, env)?;
            let rhs = truth(b, env)?;
            Literal::Boolean(lhs && rhs)
        }
        Expression::Or(a, b) => {
            let lhs = truth(a, env)?;
            let rhs = truth(b, env)?;
            Literal::Boolean(lhs || rhs)
        }
    };
    Ok(result)
}

fn lookup(env: &Environment, key: RefIdentity) -> Result<Literal, ExpressionError> {
    match env.get(&key) {
        Some(lit) => Ok(lit.clone()),
        None => Err(ExpressionError::MissingBinding(key)),
    }
}

/// Leaves an expression needs bound, in first-occurrence order.
pub fn references(expr: &Expression) -> Vec<RefIdentity> {
    let mut out = Vec::new();
    collect_references(expr, &mut out);
    out
}

fn collect_references(expr: &Expression, out: &mut Vec<RefIdentity>) {
    let leaf = match expr {
        Expression::Param(name) => RefIdentity::Param(name.clone()),
        Expression::Context(path) => RefIdentity::Context(path.clone()),
        Expression::Literal(_) => return,
        Expression::Not(e) => return collect_references(e, out),
        Expression::Eq(a, b)
        | Expression::Ne(a, b)
        | Expression::And(a, b)
        | Expression::Or(a, b) => {
            collect_references(a, out);
            collect_references(b, out);
            return;
        }
    };
    if !out.contains(&leaf) {
        out.push(leaf);
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render in the CI system's condition syntax, one rule per node kind.
pub fn render(expr: &Expression) -> String {
    match expr {
        Expression::Param(name) => format!("inputs.{name}"),
        Expression::Context(path) => path.clone(),
        Expression::Literal(lit) => render_literal(lit),
        Expression::Eq(a, b) => format!("{} == {}", render_operand(a), render_operand(b)),
        Expression::Ne(a, b) => format!("{} != {}", render_operand(a), render_operand(b)),
        Expression::Not(e) => format!("!({})", render(e)),
        Expression::And(a, b) => format!("({} && {})", render(a), render(b)),
        Expression::Or(a, b) => format!("({} || {})", render(a), render(b)),
    }
}

fn render_operand(expr: &Expression) -> String {
    match expr {
        Expression::Eq(..) | Expression::Ne(..) => format!("({})", render(expr)),
        _ => render(expr),
    }
}

fn render_literal(lit: &Literal) -> String {
    match lit {
        Literal::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => other.to_string(),
    }
}
