//! JSON-Lines record dumps, gzip-compressed when the file name ends in `.gz`.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use cda_model::Fields;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde_json::Value;

use crate::error::{IngestError, Result};

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

fn open_reader(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).map_err(|source| IngestError::io(path, source))?;
    let inner: Box<dyn Read> = if is_gzip(path) {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(Box::new(BufReader::new(inner)))
}

/// Reads every record of a JSON-Lines file fully into memory.
///
/// Blank lines are skipped; every other line must hold a JSON object.
pub fn read_jsonl(path: &Path) -> Result<Vec<Fields>> {
    let reader = open_reader(path)?;
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line.map_err(|source| IngestError::io(path, source))?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line).map_err(|source| IngestError::Json {
            path: path.to_path_buf(),
            line: line_number,
            source,
        })?;
        match value {
            Value::Object(fields) => records.push(fields),
            _ => {
                return Err(IngestError::NotAnObject {
                    path: path.to_path_buf(),
                    line: line_number,
                });
            }
        }
    }
    tracing::debug!(path = %path.display(), records = records.len(), "read jsonl");
    Ok(records)
}

/// Writes records as JSON-Lines, one object per line.
pub fn write_jsonl<'a, I>(path: &Path, records: I) -> Result<usize>
where
    I: IntoIterator<Item = &'a Fields>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| IngestError::io(parent, source))?;
    }
    let file = File::create(path).map_err(|source| IngestError::io(path, source))?;
    let mut count = 0usize;
    if is_gzip(path) {
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        count += write_lines(path, &mut encoder, records)?;
        let mut inner = encoder
            .finish()
            .map_err(|source| IngestError::io(path, source))?;
        inner
            .flush()
            .map_err(|source| IngestError::io(path, source))?;
    } else {
        let mut writer = BufWriter::new(file);
        count += write_lines(path, &mut writer, records)?;
        writer
            .flush()
            .map_err(|source| IngestError::io(path, source))?;
    }
    tracing::debug!(path = %path.display(), records = count, "wrote jsonl");
    Ok(count)
}

fn write_lines<'a, W, I>(path: &Path, writer: &mut W, records: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a Fields>,
{
    let mut count = 0usize;
    for (index, record) in records.into_iter().enumerate() {
        serde_json::to_writer(&mut *writer, record).map_err(|source| IngestError::Json {
            path: path.to_path_buf(),
            line: index + 1,
            source,
        })?;
        writer
            .write_all(b"\n")
            .map_err(|source| IngestError::io(path, source))?;
        count += 1;
    }
    Ok(count)
}
