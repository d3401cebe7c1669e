//! Error types for the BSK water-quality transform.
//!
//! Two tiers:
//! - `EtlError` is run-level and aborts the run (schema violations, I/O,
//!   configuration, an `abort` policy tripping).
//! - `RecordIssueKind` is per-record and is collected into an
//!   `ErrorReport` instead of being thrown.

use thiserror::Error;

use crate::report::{ErrorReport, RunSummary};

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Database error: {0}")]
    Postgres(#[from] postgres::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// A per-record error under the `abort` policy. Carries the full report
    /// and the stage counts of the run that was abandoned.
    #[error("Run aborted: {} record error(s)", .report.len())]
    Aborted {
        report: ErrorReport,
        summary: RunSummary,
    },
}

pub type Result<T> = std::result::Result<T, EtlError>;

/// Why a single record was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordIssueKind {
    #[error("unresolved well identifier")]
    UnresolvedWellId,

    #[error("unrecognized timestamp format")]
    UnrecognizedTimestamp,

    #[error("invalid numeric value")]
    InvalidNumber,
}
