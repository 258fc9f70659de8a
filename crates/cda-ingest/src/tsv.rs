//! Header-row TSV tables, the dominant interchange format of the pipeline.
//!
//! Columns are located by name against the header row; nothing else about
//! the table is validated. Cells are unquoted, so writers replace embedded
//! tabs and newlines with spaces.

use std::fs;
use std::path::{Path, PathBuf};

use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};

use crate::error::{IngestError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TsvTable {
    pub path: PathBuf,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TsvTable {
    pub fn new(path: impl Into<PathBuf>, headers: Vec<String>) -> Self {
        Self {
            path: path.into(),
            headers,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    /// Index of a column that must exist; a missing column is fatal.
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| IngestError::MissingColumn {
                path: self.path.clone(),
                column: name.to_string(),
            })
    }

    pub fn require_columns(&self, names: &[&str]) -> Result<Vec<usize>> {
        names.iter().map(|name| self.require_column(name)).collect()
    }

    pub fn value(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn column_values(&self, column: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows
            .iter()
            .map(move |cells| cells.get(column).map(String::as_str).unwrap_or(""))
    }

    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        write_tsv(path, &self.headers, &self.rows)
    }
}

fn normalize_header(raw: &str) -> String {
    raw.trim().trim_matches('\u{feff}').to_string()
}

/// Reads a TSV file with a header row.
///
/// Short rows are padded with empty cells and long rows truncated to the
/// header width. Cell text is kept verbatim apart from a trailing `\r`.
pub fn read_tsv(path: &Path) -> Result<TsvTable> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|source| IngestError::csv(path, source))?;
    let mut records = reader.records();
    let header_record = match records.next() {
        Some(record) => record.map_err(|source| IngestError::csv(path, source))?,
        None => {
            return Err(IngestError::MissingHeader {
                path: path.to_path_buf(),
            });
        }
    };
    let headers: Vec<String> = header_record.iter().map(normalize_header).collect();
    let mut table = TsvTable::new(path, headers);
    for record in records {
        let record = record.map_err(|source| IngestError::csv(path, source))?;
        let row: Vec<String> = record
            .iter()
            .take(table.headers.len())
            .map(|cell| cell.trim_end_matches('\r').to_string())
            .collect();
        table.push_row(row);
    }
    tracing::debug!(
        path = %path.display(),
        rows = table.len(),
        columns = table.headers.len(),
        "read tsv"
    );
    Ok(table)
}

fn sanitize_cell(value: &str) -> String {
    if value.contains(['\t', '\n', '\r']) {
        value.replace(['\t', '\n', '\r'], " ")
    } else {
        value.to_string()
    }
}

/// Writes a TSV file with a header row, creating parent directories.
pub fn write_tsv<H, R, C>(path: &Path, headers: &[H], rows: R) -> Result<()>
where
    H: AsRef<str>,
    R: IntoIterator<Item = C>,
    C: AsRef<[String]>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| IngestError::io(parent, source))?;
    }
    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(QuoteStyle::Never)
        .from_path(path)
        .map_err(|source| IngestError::csv(path, source))?;
    writer
        .write_record(headers.iter().map(|h| sanitize_cell(h.as_ref())))
        .map_err(|source| IngestError::csv(path, source))?;
    let mut count = 0usize;
    for row in rows {
        writer
            .write_record(row.as_ref().iter().map(|cell| sanitize_cell(cell)))
            .map_err(|source| IngestError::csv(path, source))?;
        count += 1;
    }
    writer
        .flush()
        .map_err(|source| IngestError::io(path, source))?;
    tracing::debug!(path = %path.display(), rows = count, "wrote tsv");
    Ok(())
}
