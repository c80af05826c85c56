//! The glossary table: a row×column CSV matrix held in memory.
//!
//! Epistemic foundation:
//! - K_i: Row 0 is the header; column 0 of each data row is the term
//! - K_i: A non-empty cell is never overwritten
//! - B_i: The file may be ragged → rows are padded to header width
//! - I^B: Crash during save → atomic temp-then-rename keeps the old file

use crate::models::{CellKey, GlossfillError, Result};
use crate::store::write_atomic;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::debug;

/// In-memory glossary table backed by a CSV file.
///
/// Cells are addressed by [`CellKey`]: absolute row index (header = 0)
/// and column index. Quoting on load and save is handled by the `csv`
/// crate (fields containing the delimiter, quotes or newlines are
/// quoted, internal quotes doubled).
#[derive(Debug, Clone)]
pub struct Table {
    path: PathBuf,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Load a table from a CSV file.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| GlossfillError::io(format!("opening table {}", path.display()), e))?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(BufReader::new(file));

        let mut records = reader.records();
        let headers: Vec<String> = match records.next() {
            Some(record) => record
                .map_err(|e| GlossfillError::Parse(format!("reading header row: {e}")))?
                .iter()
                .map(str::to_string)
                .collect(),
            None => Vec::new(),
        };

        let mut rows = Vec::new();
        for (idx, record) in records.enumerate() {
            let record = record
                .map_err(|e| GlossfillError::Parse(format!("reading data row {}: {e}", idx + 1)))?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            // Ragged rows are padded so every header column is addressable
            if row.len() < headers.len() {
                row.resize(headers.len(), String::new());
            }
            rows.push(row);
        }

        debug!(
            path = %path.display(),
            rows = rows.len(),
            columns = headers.len(),
            "Loaded table"
        );

        Ok(Self {
            path: path.to_path_buf(),
            headers,
            rows,
        })
    }

    /// Column headers; index 0 names the term column, 1.. name sections.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.headers.len()
    }

    /// Number of data rows. Absolute row indices run from 1 to this value.
    pub fn data_rows(&self) -> usize {
        self.rows.len()
    }

    /// Term (column 0) of an absolute data row, if the row exists.
    pub fn term(&self, row: usize) -> Option<&str> {
        self.data(row)?.first().map(String::as_str)
    }

    /// Cell content at `key`, if in bounds.
    pub fn get(&self, key: CellKey) -> Option<&str> {
        self.data(key.row)?.get(key.col).map(String::as_str)
    }

    /// Whether the cell at `key` is in bounds and effectively empty.
    pub fn is_empty_cell(&self, key: CellKey) -> bool {
        self.get(key).is_some_and(|v| v.trim().is_empty())
    }

    /// Set the cell at `key` to `value`.
    ///
    /// Returns false (and leaves the table untouched) when the key is out
    /// of bounds or the cell already holds content: generated text never
    /// replaces existing text.
    pub fn set(&mut self, key: CellKey, value: String) -> bool {
        if key.row == 0 || key.row > self.rows.len() {
            return false;
        }
        let row = &mut self.rows[key.row - 1];
        match row.get_mut(key.col) {
            Some(cell) if cell.trim().is_empty() => {
                *cell = value;
                true
            }
            _ => false,
        }
    }

    /// Save the table back to its file via an atomic replace.
    pub fn save(&self) -> Result<()> {
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(Vec::new());
        writer
            .write_record(&self.headers)
            .map_err(|e| GlossfillError::Internal(format!("serializing header row: {e}")))?;
        for row in &self.rows {
            writer
                .write_record(row)
                .map_err(|e| GlossfillError::Internal(format!("serializing data row: {e}")))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| GlossfillError::Internal(format!("finishing table serialization: {e}")))?;

        write_atomic(&self.path, &bytes)
    }

    fn data(&self, row: usize) -> Option<&Vec<String>> {
        if row == 0 {
            return None;
        }
        self.rows.get(row - 1)
    }
}
