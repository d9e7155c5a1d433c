//! Flat CSV rendering of nested JSON records.
//!
//! Nested objects flatten by dot path and arrays unwind into one row per
//! element. Headers keep only the last path segment, so
//! `data.lastSixMonths.count` becomes `count`; colliding headers are emitted
//! as-is.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

/// A flattened row: `(dot path, rendered cell)` in field order.
type FlatRow = Vec<(String, String)>;

/// Render `records` as CSV. Returns an empty string when no column exists.
pub fn to_csv(records: &[Value]) -> String {
    let mut columns: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut rows: Vec<FlatRow> = Vec::new();

    for record in records {
        for row in unwind(record, "") {
            for (path, _) in &row {
                if seen.insert(path.clone()) {
                    columns.push(path.clone());
                }
            }
            rows.push(row);
        }
    }

    if columns.is_empty() {
        return String::new();
    }

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(
        columns
            .iter()
            .map(|path| escape(header_of(path)))
            .collect::<Vec<_>>()
            .join(","),
    );

    for row in rows {
        let cells: HashMap<String, String> = row.into_iter().collect();
        lines.push(
            columns
                .iter()
                .map(|path| cells.get(path).map_or_else(String::new, |cell| escape(cell)))
                .collect::<Vec<_>>()
                .join(","),
        );
    }

    lines.join("\n")
}

/// Expand one value into the flat rows it produces.
fn unwind(value: &Value, path: &str) -> Vec<FlatRow> {
    match value {
        Value::Object(fields) => {
            let mut rows: Vec<FlatRow> = vec![Vec::new()];
            for (key, child) in fields {
                let child_rows = unwind(child, &join_path(path, key));
                rows = rows
                    .iter()
                    .flat_map(|row| {
                        child_rows.iter().map(move |child_row| {
                            let mut merged = row.clone();
                            merged.extend(child_row.iter().cloned());
                            merged
                        })
                    })
                    .collect();
            }
            rows
        }
        Value::Array(items) if items.is_empty() => vec![vec![(path.to_string(), String::new())]],
        Value::Array(items) => items.iter().flat_map(|item| unwind(item, path)).collect(),
        scalar => vec![vec![(path.to_string(), render(scalar))]],
    }
}

fn render(scalar: &Value) -> String {
    match scalar {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            // Whole floats print without a fractional part: 25.0 -> 25.
            Some(f) if n.is_f64() && f.is_finite() && f.fract() == 0.0 => format!("{f:.0}"),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn header_of(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

/// Quote a field when it contains a delimiter, quote or line break.
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
