//! Output channel parsing.
//!
//! A job writes its outputs to the file named by `JOBFLOW_OUTPUT_FILE`, one
//! `name=value` per line, or as a heredoc block for multi-line values:
//!
//! ```text
//! version=1.4.0
//! notes<<EOF
//! first line
//! second line
//! EOF
//! ```

use std::collections::BTreeMap;

use jobflow_types::contract::TaskContract;

/// Parse the output channel, keeping only names the contract declares.
/// Later assignments to the same name win.
pub fn parse_outputs(content: &str, contract: &TaskContract, job: &str) -> BTreeMap<String, String> {
    let mut outputs = BTreeMap::new();
    let mut lines = content.lines();

    while let Some(line) = lines.next() {
        if line.trim().is_empty() {
            continue;
        }

        let (name, value) = if let Some((name, delimiter)) = heredoc_start(line) {
            let mut body = Vec::new();
            let mut terminated = false;
            for next in lines.by_ref() {
                if next == delimiter {
                    terminated = true;
                    break;
                }
                body.push(next);
            }
            if !terminated {
                tracing::warn!(job, output = name, delimiter, "unterminated output block");
            }
            (name, body.join("\n"))
        } else if let Some((name, value)) = line.split_once('=') {
            (name, value.to_string())
        } else {
            tracing::warn!(job, line, "ignoring malformed output line");
            continue;
        };

        if contract.output(name).is_none() {
            tracing::warn!(job, output = name, "ignoring undeclared output");
            continue;
        }
        outputs.insert(name.to_string(), value);
    }

    outputs
}

/// `name<<DELIM` where the name contains no `=`.
fn heredoc_start(line: &str) -> Option<(&str, &str)> {
    let (name, delimiter) = line.split_once("<<")?;
    if name.is_empty() || name.contains('=') || delimiter.is_empty() {
        return None;
    }
    Some((name, delimiter))
}
