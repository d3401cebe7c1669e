//! Hand-off artifacts: the Parquet file for the loader and the JSON error
//! report.
//!
//! Files are written to a temporary file in the destination directory and
//! renamed into place, so a failed run never leaves a truncated Parquet
//! file behind for the loader to pick up.

use std::collections::HashSet;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, Date32Builder, Float64Builder, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::config::EtlConfig;
use crate::error::{EtlError, Result};
use crate::model::{CanonicalRecord, DATE_FORMAT};
use crate::report::{ErrorReport, RecordIssue, RunSummary};

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<dir>/<stem>_<run_date>.parquet`
pub fn data_path(dir: &Path, stem: &str, run_date: NaiveDate) -> PathBuf {
    dir.join(format!("{}_{}.parquet", stem, run_date.format(DATE_FORMAT)))
}

/// `<dir>/<stem>_<run_date>.errors.json`
pub fn report_path(dir: &Path, stem: &str, run_date: NaiveDate) -> PathBuf {
    dir.join(format!("{}_{}.errors.json", stem, run_date.format(DATE_FORMAT)))
}

// ---------------------------------------------------------------------------
// Column typing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    /// The normalized sample date.
    SampleDate,
    /// Other `YYYY-MM-DD` columns produced by the run (date_added).
    Date,
    Float,
    Text,
}

fn column_kind(name: &str, config: &EtlConfig) -> ColumnKind {
    if name == config.columns.timestamp {
        ColumnKind::SampleDate
    } else if config.columns.date_added.as_deref() == Some(name) {
        ColumnKind::Date
    } else if config.columns.numeric.iter().any(|c| c == name) {
        ColumnKind::Float
    } else {
        ColumnKind::Text
    }
}

/// Arrow schema for the output columns. Every column is nullable except
/// the sample date.
pub fn output_schema(columns: &[String], config: &EtlConfig) -> Schema {
    let fields: Vec<Field> = columns
        .iter()
        .map(|name| match column_kind(name, config) {
            ColumnKind::SampleDate => Field::new(name, DataType::Date32, false),
            ColumnKind::Date => Field::new(name, DataType::Date32, true),
            ColumnKind::Float => Field::new(name, DataType::Float64, true),
            ColumnKind::Text => Field::new(name, DataType::Utf8, true),
        })
        .collect();
    Schema::new(fields)
}

fn days_since_epoch(date: NaiveDate) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    date.signed_duration_since(epoch).num_days() as i32
}

fn cell<'a>(record: &'a CanonicalRecord, column: &str) -> Result<&'a str> {
    record.get(column).ok_or_else(|| {
        EtlError::SchemaViolation(format!("line {}: missing output column '{}'", record.line, column))
    })
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

/// Builds a single record batch for `records`, in `columns` order.
pub fn to_record_batch(
    columns: &[String],
    records: &[CanonicalRecord],
    config: &EtlConfig,
) -> Result<RecordBatch> {
    let mut seen = HashSet::new();
    if let Some(dup) = columns.iter().find(|c| !seen.insert(c.as_str())) {
        return Err(EtlError::SchemaViolation(format!("duplicate output column '{}'", dup)));
    }

    let schema = Arc::new(output_schema(columns, config));
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len());

    for name in columns {
        let array: ArrayRef = match column_kind(name, config) {
            ColumnKind::SampleDate => {
                let mut b = Date32Builder::with_capacity(records.len());
                for r in records {
                    b.append_value(days_since_epoch(r.sample_date));
                }
                Arc::new(b.finish())
            }
            ColumnKind::Date => {
                let mut b = Date32Builder::with_capacity(records.len());
                for r in records {
                    let value = cell(r, name)?.trim();
                    if value.is_empty() {
                        b.append_null();
                    } else {
                        let date = NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|e| {
                            EtlError::SchemaViolation(format!(
                                "line {}: '{}' in '{}' is not a date: {}",
                                r.line, value, name, e
                            ))
                        })?;
                        b.append_value(days_since_epoch(date));
                    }
                }
                Arc::new(b.finish())
            }
            ColumnKind::Float => {
                let mut b = Float64Builder::with_capacity(records.len());
                for r in records {
                    let value = cell(r, name)?.trim();
                    if value.is_empty() {
                        b.append_null();
                    } else {
                        let parsed = value.parse::<f64>().map_err(|_| {
                            EtlError::SchemaViolation(format!(
                                "line {}: '{}' in '{}' is not numeric",
                                r.line, value, name
                            ))
                        })?;
                        b.append_value(parsed);
                    }
                }
                Arc::new(b.finish())
            }
            ColumnKind::Text => {
                let mut b = StringBuilder::with_capacity(records.len(), records.len() * 16);
                for r in records {
                    let value = cell(r, name)?;
                    if value.trim().is_empty() {
                        b.append_null();
                    } else {
                        b.append_value(value);
                    }
                }
                Arc::new(b.finish())
            }
        };
        arrays.push(array);
    }

    Ok(RecordBatch::try_new(schema, arrays)?)
}

/// Writes canonical records to a Parquet file at `path`, replacing any
/// existing file. Returns the number of rows written.
pub fn write_parquet(
    path: &Path,
    columns: &[String],
    records: &[CanonicalRecord],
    config: &EtlConfig,
) -> Result<usize> {
    let batch = to_record_batch(columns, records, config)?;
    let temp = temp_file_for(path)?;

    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(temp, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    let temp = writer.into_inner()?;
    persist(temp, path)?;

    Ok(batch.num_rows())
}

// ---------------------------------------------------------------------------
// Error report
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ReportDocument<'a> {
    run_date: String,
    input: String,
    summary: &'a RunSummary,
    error_count: usize,
    issues: &'a [RecordIssue],
}

/// Writes the JSON error report. Written for every run, empty or not.
pub fn write_report(
    path: &Path,
    input: &Path,
    run_date: NaiveDate,
    summary: &RunSummary,
    report: &ErrorReport,
) -> Result<()> {
    let document = ReportDocument {
        run_date: run_date.format(DATE_FORMAT).to_string(),
        input: input.display().to_string(),
        summary,
        error_count: report.len(),
        issues: &report.issues,
    };

    let temp = temp_file_for(path)?;
    let mut out = BufWriter::new(temp);
    serde_json::to_writer_pretty(&mut out, &document)?;
    out.flush()?;
    let temp = out.into_inner().map_err(|e| EtlError::Io(e.into_error()))?;
    persist(temp, path)
}

fn temp_file_for(path: &Path) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    Ok(NamedTempFile::new_in(dir)?)
}

fn persist(temp: NamedTempFile, path: &Path) -> Result<()> {
    temp.persist(path).map_err(|e| EtlError::Io(e.error))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
