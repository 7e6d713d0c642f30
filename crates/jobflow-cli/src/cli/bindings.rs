//! `NAME=VALUE` bindings from the command line.
//!
//! Parameter values are converted to the type the automation declares for
//! them; context values (and untyped parameters) are inferred.

use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow, bail};
use jobflow_core::expression::Environment;
use jobflow_core::graph::Automation;
use jobflow_types::contract::ParamType;
use jobflow_types::literal::Literal;

/// Split `NAME=VALUE` at the first `=`.
pub fn parse_assignment(raw: &str) -> Result<(&str, &str)> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected NAME=VALUE, got '{raw}'"))?;
    if name.is_empty() {
        bail!("binding '{raw}' has an empty name");
    }
    Ok((name, value))
}

/// Convert a raw value to a literal of the given type.
pub fn typed_literal(value: &str, param_type: ParamType) -> Result<Literal> {
    Ok(match param_type {
        ParamType::String | ParamType::Path => Literal::String(value.to_string()),
        ParamType::Integer => Literal::Integer(
            value
                .parse()
                .with_context(|| format!("'{value}' is not an integer"))?,
        ),
        ParamType::Float => Literal::Float(
            value
                .parse()
                .with_context(|| format!("'{value}' is not a number"))?,
        ),
        ParamType::Boolean => match value {
            "true" => Literal::Boolean(true),
            "false" => Literal::Boolean(false),
            _ => bail!("'{value}' is not a boolean (expected true or false)"),
        },
        ParamType::Any => inferred_literal(value),
    })
}

/// Booleans, then integers, then floats, else the raw string.
pub fn inferred_literal(value: &str) -> Literal {
    match value {
        "true" => return Literal::Boolean(true),
        "false" => return Literal::Boolean(false),
        _ => {}
    }
    if let Ok(i) = value.parse::<i64>() {
        return Literal::Integer(i);
    }
    if let Ok(f) = value.parse::<f64>() {
        return Literal::Float(f);
    }
    Literal::String(value.to_string())
}

/// Build the condition environment for a run.
///
/// Layering, lowest first: configured context, `--context`, `--param`.
/// Parameter defaults are bound by the executor itself.
pub fn environment(
    automation: &Automation,
    config_context: &BTreeMap<String, Literal>,
    params: &[String],
    context: &[String],
) -> Result<Environment> {
    let mut env = Environment::new();

    for (path, value) in config_context {
        env.bind_context(path.clone(), value.clone());
    }

    for raw in context {
        let (path, value) = parse_assignment(raw)?;
        env.bind_context(path, inferred_literal(value));
    }

    for raw in params {
        let (name, value) = parse_assignment(raw)?;
        let spec = automation
            .params()
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| anyhow!("automation '{}' has no parameter '{name}'", automation.name()))?;
        let literal = typed_literal(value, spec.param_type)
            .with_context(|| format!("invalid value for parameter '{name}'"))?;
        env.bind_param(name, literal);
    }

    Ok(env)
}
