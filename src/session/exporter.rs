//! CSV export and import of recordings
//!
//! The persisted layout is a plain delimited table:
//!
//! ```text
//! Time,1,8
//! 0.2531,0.5,1.2
//! 1.2607,0.51,1.19
//! ```
//!
//! The header lists the series keys in recording order. Each following line
//! is one sample index. Values are written with the shortest representation
//! that parses back to the same `f64`.
//!
//! Import is all-or-nothing: the file is parsed into a fresh [`Recording`]
//! and only a fully valid one is returned, so a failed import never touches
//! the recording currently held by a store.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::backend::tick::{SnapshotConsumer, TickContext};
use crate::error::{RecorderError, Result, ResultExt};
use crate::types::SeriesKey;

use super::types::Recording;

/// Write `recording` as CSV to any writer
pub fn export_to_writer<W: Write>(recording: &Recording, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);

    csv.write_record(recording.keys().iter().map(ToString::to_string))?;
    for row in recording.rows() {
        csv.write_record(row.iter().map(ToString::to_string))?;
    }
    csv.flush()?;
    Ok(())
}

/// Write `recording` to a CSV file
///
/// The data is written to a sibling temporary file first and renamed over
/// `path`, so readers never observe a half-written file.
pub fn export_to_path(recording: &Recording, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = Path::new(&tmp_name);

    let file = File::create(tmp_path)
        .map_err(RecorderError::from)
        .with_context(|| format!("Failed to create {:?}", tmp_path))?;
    export_to_writer(recording, file).with_context(|| format!("Failed to write {:?}", path))?;
    std::fs::rename(tmp_path, path)
        .map_err(RecorderError::from)
        .with_context(|| format!("Failed to replace {:?}", path))?;

    tracing::debug!("Exported {} rows to {:?}", recording.len(), path);
    Ok(())
}

/// Parse a CSV recording from any reader
///
/// Every field, including `Time`, must be a decimal number. A non-numeric
/// field, a row with the wrong number of fields, or a bad header fails the
/// whole import with [`RecorderError::Format`].
pub fn import_from_reader<R: Read>(reader: R) -> Result<Recording> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv
        .headers()
        .map_err(|e| RecorderError::Format(format!("unreadable header: {}", e)))?
        .clone();
    if headers.is_empty() || headers.iter().all(str::is_empty) {
        return Err(RecorderError::Format("missing header row".to_string()));
    }

    let mut keys = Vec::with_capacity(headers.len());
    let mut seen = HashSet::new();
    for field in headers.iter() {
        let key: SeriesKey = field.parse()?;
        if !seen.insert(key) {
            return Err(RecorderError::Format(format!("duplicate column '{}'", field)));
        }
        keys.push(key);
    }

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); keys.len()];
    for record in csv.records() {
        let record = record.map_err(|e| RecorderError::Format(e.to_string()))?;
        let line = record.position().map_or(0, |p| p.line());
        for (idx, field) in record.iter().enumerate() {
            let value: f64 = field.parse().map_err(|_| {
                RecorderError::Format(format!(
                    "line {}, column {}: '{}' is not a number",
                    line, keys[idx], field
                ))
            })?;
            columns[idx].push(value);
        }
    }

    let series: BTreeMap<SeriesKey, Vec<f64>> = keys.into_iter().zip(columns).collect();
    Recording::from_series(series)
}

/// Read a CSV recording from a file
pub fn import_from_path(path: impl AsRef<Path>) -> Result<Recording> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(RecorderError::from)
        .with_context(|| format!("Failed to open {:?}", path))?;
    let recording = import_from_reader(file)?;
    tracing::info!(
        "Imported {} rows x {} columns from {:?}",
        recording.len(),
        recording.column_count(),
        path
    );
    Ok(recording)
}

/// Tick consumer that rewrites a CSV file with every snapshot
pub struct AutosaveConsumer {
    path: std::path::PathBuf,
    last_len: Option<usize>,
}

impl AutosaveConsumer {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_len: None,
        }
    }
}

impl SnapshotConsumer for AutosaveConsumer {
    fn on_tick(&mut self, snapshot: &Recording, _ctx: &TickContext) {
        // Nothing new since the last write
        if self.last_len == Some(snapshot.len()) {
            return;
        }
        match export_to_path(snapshot, &self.path) {
            Ok(()) => self.last_len = Some(snapshot.len()),
            Err(e) => tracing::warn!("Autosave to {:?} failed: {}", self.path, e),
        }
    }
}
