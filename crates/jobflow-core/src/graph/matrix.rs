//! Matrix expansion for local runs.

use jobflow_types::job::{JobId, Matrix};
use jobflow_types::literal::Literal;

/// One axis assignment, in axis order.
pub type Assignment = Vec<(String, Literal)>;

/// Cartesian product of the matrix axes, first axis outermost.
pub fn expand(matrix: &Matrix) -> Vec<Assignment> {
    if matrix.axes.is_empty() {
        return Vec::new();
    }
    let mut combos: Vec<Assignment> = vec![Vec::new()];
    for axis in &matrix.axes {
        let mut next = Vec::with_capacity(combos.len() * axis.values.len());
        for combo in &combos {
            for value in &axis.values {
                let mut extended = combo.clone();
                extended.push((axis.name.clone(), value.clone()));
                next.push(extended);
            }
        }
        combos = next;
    }
    combos
}

/// Deterministic instance name: `name[axis=value,...]`.
pub fn instance_name(group: &str, assignment: &[(String, Literal)]) -> JobId {
    let parts: Vec<String> = assignment
        .iter()
        .map(|(axis, value)| format!("{axis}={value}"))
        .collect();
    JobId::new(format!("{group}[{}]", parts.join(",")))
}

/// Replace `${{ matrix.<axis> }}` placeholders with the assigned values.
///
/// Placeholders naming an axis outside the assignment, and any other
/// `${{ ... }}` expression, are left untouched.
pub fn substitute(template: &str, assignment: &[(String, Literal)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 3..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let inner = after[..end].trim();
        let value = inner
            .strip_prefix("matrix.")
            .and_then(|axis| assignment.iter().find(|(name, _)| name == axis))
            .map(|(_, value)| value.to_string());
        match value {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[start..start + 3 + end + 2]),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}
