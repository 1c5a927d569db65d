//! # CSV Template
//!
//! The header row data providers fill in: every top-level property of the
//! primary schema, in schema order, double-quoted, comma-separated, and
//! terminated by CRLF.

use std::path::{Path, PathBuf};

use serde_json::Value;

/// Render the header line for `schema`. Empty when it declares no properties.
pub fn csv_headers(schema: &Value) -> String {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return String::new();
    };
    let columns: Vec<String> = properties
        .keys()
        .map(|name| format!("\"{}\"", name.replace('"', "\"\"")))
        .collect();
    format!("{}\r\n", columns.join(","))
}

/// Write `csv/headers.csv` below `output_dir`, returning its path.
pub fn write_headers(output_dir: &Path, schema: &Value) -> std::io::Result<PathBuf> {
    let dir = output_dir.join("csv");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("headers.csv");
    std::fs::write(&path, csv_headers(schema))?;
    Ok(path)
}
