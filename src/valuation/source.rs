//! Source functions - load raw parcel rows from assessor export files

use crate::valuation::types::RawRecord;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Errors raised while reading an input file
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),
}

/// Load raw rows, choosing the parser from the file extension
pub fn load_records(path: &Path) -> Result<Vec<RawRecord>, SourceError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default();

    let records = match extension.as_str() {
        "csv" => load_csv(path)?,
        "json" => load_json(path)?,
        "jsonl" | "ndjson" => load_json_lines(path)?,
        other => return Err(SourceError::UnsupportedFormat(other.to_string())),
    };

    info!("Loaded {} raw rows from {:?}", records.len(), path);
    Ok(records)
}

/// CSV with a header row; every cell is kept as a string
pub fn load_csv(path: &Path) -> Result<Vec<RawRecord>, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let mut records = Vec::new();
    let mut parse_errors = 0;

    for (idx, result) in reader.deserialize::<HashMap<String, String>>().enumerate() {
        match result {
            Ok(row) => records.push(
                row.into_iter()
                    .map(|(key, value)| (key.trim().to_string(), Value::String(value)))
                    .collect(),
            ),
            Err(e) => {
                parse_errors += 1;
                if parse_errors <= 10 {
                    // Only log first 10 errors
                    warn!("Failed to deserialize row {}: {}", idx, e);
                }
            }
        }
    }

    if parse_errors > 0 {
        warn!("Skipped {} unreadable CSV rows in {:?}", parse_errors, path);
    }

    Ok(records)
}

/// A JSON array of objects
pub fn load_json(path: &Path) -> Result<Vec<RawRecord>, SourceError> {
    let text = fs::read_to_string(path)?;
    let rows: Vec<Value> = serde_json::from_str(&text)?;
    Ok(rows.into_iter().filter_map(into_record).collect())
}

/// One JSON object per line; blank lines are ignored
pub fn load_json_lines(path: &Path) -> Result<Vec<RawRecord>, SourceError> {
    let reader = BufReader::new(fs::File::open(path)?);
    let mut records = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(&line) {
            Ok(value) => records.extend(into_record(value)),
            Err(e) => warn!("Failed to parse line {}: {}", idx + 1, e),
        }
    }

    Ok(records)
}

fn into_record(value: Value) -> Option<RawRecord> {
    match value {
        Value::Object(map) => Some(map.into_iter().collect()),
        other => {
            warn!("Skipping non-object row: {}", other);
            None
        }
    }
}
