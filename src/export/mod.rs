pub mod csv;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::metrics::model::MetricsOutput;
use crate::metrics::window::Window;

/// File written by the JSON exporter.
pub const JSON_REPORT_FILE: &str = "metrics.json";

/// Report output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Json,
    Csv,
}

/// Exporter writes a finished report to disk in one format.
///
/// Enum dispatch keeps the set of formats closed and avoids boxing.
pub enum Exporter {
    Json(JsonExporter),
    Csv(CsvExporter),
}

impl Exporter {
    /// Build the exporter for `format`, writing under `dir`.
    pub fn for_format(format: OutputFormat, dir: impl Into<PathBuf>) -> Self {
        match format {
            OutputFormat::Json => Self::Json(JsonExporter::new(dir)),
            OutputFormat::Csv => Self::Csv(CsvExporter::new(dir)),
        }
    }

    /// Returns the exporter name for logging.
    pub fn name(&self) -> &str {
        match self {
            Self::Json(e) => e.name(),
            Self::Csv(e) => e.name(),
        }
    }

    /// Write the report. Returns the paths written.
    pub fn export(&self, output: &MetricsOutput) -> Result<Vec<PathBuf>> {
        match self {
            Self::Json(e) => e.export(output),
            Self::Csv(e) => e.export(output),
        }
    }
}

/// Writes the whole report as a single JSON document.
pub struct JsonExporter {
    dir: PathBuf,
}

impl JsonExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn name(&self) -> &str {
        "json"
    }

    pub fn export(&self, output: &MetricsOutput) -> Result<Vec<PathBuf>> {
        ensure_dir(&self.dir)?;

        let body = serde_json::to_string_pretty(output).context("serializing metrics report")?;
        let path = self.dir.join(JSON_REPORT_FILE);
        fs::write(&path, body).with_context(|| format!("writing {}", path.display()))?;

        tracing::info!(path = %path.display(), "JSON report written");

        Ok(vec![path])
    }
}

/// Writes one `<kebab-metric-name>.csv` file per metric.
pub struct CsvExporter {
    dir: PathBuf,
}

impl CsvExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn name(&self) -> &str {
        "csv"
    }

    pub fn export(&self, output: &MetricsOutput) -> Result<Vec<PathBuf>> {
        ensure_dir(&self.dir)?;

        let metrics = output
            .named_values()
            .context("serializing metrics for CSV")?;

        let mut written = Vec::with_capacity(metrics.len());
        for (name, value) in metrics {
            let records = csv_records(value);

            let path = self.dir.join(format!("{}.csv", to_kebab_case(name)));
            fs::write(&path, csv::to_csv(&records))
                .with_context(|| format!("writing {}", path.display()))?;

            tracing::debug!(
                metric = name,
                rows = records.len(),
                path = %path.display(),
                "CSV written",
            );
            written.push(path);
        }

        tracing::info!(dir = %self.dir.display(), files = written.len(), "CSV report written");

        Ok(written)
    }
}

/// Column naming the window a CSV row belongs to.
pub const WINDOW_COLUMN: &str = "window";

/// Split a metric value into the records handed to [`csv::to_csv`].
///
/// Arrays yield one record per element. A windowed value yields the records
/// of each window in turn, tagged with a `window` column, so rows grow with
/// the sum of the window sizes.
pub fn csv_records(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.into_iter().flat_map(csv_records).collect(),
        Value::Object(fields) if is_windowed(&fields) => split_windows(fields, None),
        Value::Object(fields) => {
            let windowed_key = fields.iter().find_map(|(key, child)| match child {
                Value::Object(inner) if is_windowed(inner) => Some(key.clone()),
                _ => None,
            });
            match windowed_key {
                Some(key) => split_windows(fields, Some(&key)),
                None => vec![Value::Object(fields)],
            }
        }
        other => vec![other],
    }
}

fn is_windowed(fields: &Map<String, Value>) -> bool {
    fields.len() == Window::ALL.len()
        && Window::ALL
            .iter()
            .all(|window| fields.contains_key(window.as_str()))
}

/// Expand `fields` once per window.
///
/// With `nested` set, the windowed value sits under that key of a record
/// whose other fields repeat on every row; otherwise `fields` is the
/// windowed value itself.
fn split_windows(mut fields: Map<String, Value>, nested: Option<&str>) -> Vec<Value> {
    let mut windows = match nested {
        Some(key) => match fields.get_mut(key).map(Value::take) {
            Some(Value::Object(windows)) => windows,
            _ => return vec![Value::Object(fields)],
        },
        None => std::mem::take(&mut fields),
    };

    let mut records = Vec::new();
    for window in Window::ALL {
        let Some(value) = windows.remove(window.as_str()) else {
            continue;
        };
        // An empty window still yields one row, with its columns left empty.
        let items = match value {
            Value::Array(items) if items.is_empty() => vec![Value::Object(Map::new())],
            Value::Array(items) => items,
            other => vec![other],
        };

        for item in items {
            let mut record = Map::with_capacity(fields.len() + 1);
            match nested {
                Some(key) => {
                    for (name, field) in &fields {
                        if name == key {
                            record.insert(WINDOW_COLUMN.to_string(), window.as_str().into());
                            record.insert(name.clone(), item.clone());
                        } else {
                            record.insert(name.clone(), field.clone());
                        }
                    }
                }
                None => {
                    record.insert(WINDOW_COLUMN.to_string(), window.as_str().into());
                    match item {
                        Value::Object(inner) => record.extend(inner),
                        scalar => {
                            record.insert("value".to_string(), scalar);
                        }
                    }
                }
            }
            records.push(Value::Object(record));
        }
    }

    records
}

fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating output dir {}", dir.display()))
}

/// `publishedEServices` → `published-e-services`.
pub fn to_kebab_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_ascii_uppercase() => next.is_some_and(|n| n.is_ascii_lowercase()),
                _ => false,
            };
            if boundary {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
        } else if c == '_' || c == ' ' {
            out.push('-');
        } else {
            out.push(c);
        }
    }

    out
}
