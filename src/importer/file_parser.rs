// ==========================================
// VitalVida Sync Pipeline - roster CSV parser
// ==========================================
// Header-mapped rows; header names are trimmed and
// lower-cased, blank rows are skipped.
// ==========================================

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use csv::ReaderBuilder;

use crate::importer::error::{ImportError, ImportResult};

pub const ROSTER_COLUMNS: [&str; 5] = ["da_code", "full_name", "phone", "location", "rating"];

/// One data row; `line` is the 1-based line in the file (header = line 1)
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub line: usize,
    pub fields: HashMap<String, String>,
}

impl RawRow {
    pub fn get(&self, column: &str) -> &str {
        self.fields.get(column).map(String::as_str).unwrap_or("")
    }
}

pub fn parse_roster(path: &Path) -> ImportResult<Vec<RawRow>> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => {}
        other => {
            return Err(ImportError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            ))
        }
    }

    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_ascii_lowercase())
        .collect();

    let missing: Vec<&str> = ROSTER_COLUMNS
        .iter()
        .copied()
        .filter(|c| !headers.iter().any(|h| h == c))
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns(missing.join(", ")));
    }

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result?;
        let mut fields = HashMap::new();
        for (col_idx, value) in record.iter().enumerate() {
            if let Some(header) = headers.get(col_idx) {
                fields.insert(header.clone(), value.trim().to_string());
            }
        }

        if fields.values().all(|v| v.is_empty()) {
            continue;
        }

        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 2);
        rows.push(RawRow {
            line,
            fields,
        });
    }

    Ok(rows)
}
