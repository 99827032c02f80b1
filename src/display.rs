// Helpers for dumping raw API responses to the terminal.

use std::io::{self, Write};

use serde_json::Value;

/// Pretty-print a response. Lists are printed one element per block.
/// Object keys come out sorted since serde_json keeps maps ordered.
pub fn display(value: &Value, out: &mut impl Write) -> io::Result<()> {
    match value {
        Value::Array(items) => {
            for item in items {
                writeln!(out, "{}", serde_json::to_string_pretty(item)?)?;
            }
        }
        other => writeln!(out, "{}", serde_json::to_string_pretty(other)?)?,
    }
    Ok(())
}

/// Every leaf of `value` as `(path, rendered value)`, with paths written the
/// way they would be indexed: `parent['key'][0]`. `search` keeps only paths
/// containing it, case-insensitively.
pub fn props(value: &Value, parent: &str, search: Option<&str>) -> Vec<(String, String)> {
    let mut found = Vec::new();
    collect_props(value, parent.to_string(), search.map(str::to_lowercase).as_deref(), &mut found);
    found
}

fn collect_props(value: &Value, path: String, search: Option<&str>, found: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                collect_props(child, format!("{path}['{key}']"), search, found);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                collect_props(child, format!("{path}[{i}]"), search, found);
            }
        }
        leaf => {
            if search.map_or(true, |s| path.to_lowercase().contains(s)) {
                let rendered = match leaf {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                found.push((path, rendered));
            }
        }
    }
}

pub fn show_props(value: &Value, parent: &str, search: Option<&str>, out: &mut impl Write) -> io::Result<()> {
    for (path, rendered) in props(value, parent, search) {
        writeln!(out, "{path} = {rendered}")?;
    }
    Ok(())
}
