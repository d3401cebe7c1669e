//! The transform: raw export rows in, canonical records plus an error
//! report out.
//!
//! Stages run strictly in order: site filter, blank filter, then per-record
//! well reconciliation, timestamp normalization and numeric checks, and
//! finally the missing-value filter over records that came through clean.
//! Filters drop records silently (counted in the summary). Per-record
//! failures are collected into the `ErrorReport` so one bad row never stops
//! the rest of the file, and a row with an empty result is still reported
//! if its identifier or date is bad. Structural problems abort immediately.

use chrono::NaiveDate;

use crate::config::{EtlConfig, ErrorPolicy};
use crate::error::{EtlError, RecordIssueKind, Result};
use crate::filter::{BlankFilter, SiteFilter};
use crate::logging::{self, Stage};
use crate::model::{CanonicalRecord, DATE_FORMAT, RawRecord};
use crate::report::{ErrorReport, RecordIssue, RunSummary};
use crate::timestamps::TimestampNormalizer;
use crate::wells::{ResolvedVia, WellReconciler};

/// Everything a run produces before it touches the output directory.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutput {
    pub records: Vec<CanonicalRecord>,
    pub report: ErrorReport,
    pub summary: RunSummary,
}

/// A configured transform. Building one validates the configuration
/// (grammar, mapping table, timestamp allow-list).
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: EtlConfig,
    site: SiteFilter,
    blanks: BlankFilter,
    wells: WellReconciler,
    timestamps: TimestampNormalizer,
}

impl Pipeline {
    pub fn new(config: EtlConfig) -> Result<Self> {
        let wells = WellReconciler::from_config(&config.wells)?;
        let timestamps = TimestampNormalizer::from_config(&config.timestamps)?;
        Ok(Self {
            site: SiteFilter::from_config(&config),
            blanks: BlankFilter::from_config(&config),
            wells,
            timestamps,
            config,
        })
    }

    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    pub fn wells(&self) -> &WellReconciler {
        &self.wells
    }

    /// Runs every stage over `records`.
    ///
    /// `run_date` stamps the optional `date_added` column; it is passed in
    /// rather than read from the clock so runs are reproducible.
    ///
    /// Under `ErrorPolicy::Abort` a non-empty report becomes
    /// `EtlError::Aborted`, carrying the report and a summary in which the
    /// records that would have been written are counted as withheld.
    pub fn transform(&self, records: Vec<RawRecord>, run_date: NaiveDate) -> Result<TransformOutput> {
        let mut summary = RunSummary {
            rows_read: records.len(),
            ..RunSummary::default()
        };
        let mut report = ErrorReport::default();

        let (records, dropped) = self.site.apply(records)?;
        summary.excluded_site = dropped;
        logging::log_stage_count(Stage::SiteFilter, dropped, records.len());

        let (records, dropped) = self.blanks.apply(records);
        summary.blanks = dropped;
        logging::log_stage_count(Stage::BlankFilter, dropped, records.len());

        let mut canonical = Vec::with_capacity(records.len());
        for record in records {
            let complete = self.has_required_values(&record)?;
            match self.canonicalize(record, run_date)? {
                Ok(_) if !complete => summary.missing_values += 1,
                Ok(done) => canonical.push(done),
                Err(issues) => {
                    summary.errored += 1;
                    for issue in issues {
                        report.push(issue);
                    }
                }
            }
        }
        if summary.missing_values > 0 {
            logging::info(
                Stage::Ingest,
                None,
                &format!(
                    "dropped {} record(s) with an empty {}",
                    summary.missing_values,
                    self.config.columns.non_null.join("/")
                ),
            );
        }
        summary.written = canonical.len();

        if self.config.run.error_policy == ErrorPolicy::Abort && !report.is_empty() {
            summary.withheld = summary.written;
            summary.written = 0;
            logging::log_run_summary(&summary, &report);
            return Err(EtlError::Aborted { report, summary });
        }

        logging::log_run_summary(&summary, &report);

        Ok(TransformOutput {
            records: canonical,
            report,
            summary,
        })
    }

    /// `false` if any `non_null` column is empty. A missing column is a
    /// schema violation.
    fn has_required_values(&self, record: &RawRecord) -> Result<bool> {
        for column in &self.config.columns.non_null {
            if required(record, column)?.trim().is_empty() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Reconciles one record. The outer `Result` is structural and aborts
    /// the run; the inner one carries every per-record issue found.
    fn canonicalize(
        &self,
        mut record: RawRecord,
        run_date: NaiveDate,
    ) -> Result<std::result::Result<CanonicalRecord, Vec<RecordIssue>>> {
        let columns = &self.config.columns;
        let mut issues = Vec::new();

        let raw_well = required(&record, &columns.well_id)?;
        let well = self.wells.reconcile(raw_well);
        match &well {
            Some(found) if found.via != ResolvedVia::Grammar => logging::debug(
                Stage::Reconcile,
                Some(&found.canonical),
                &format!("line {}: {:?} resolved via {:?}", record.line, raw_well, found.via),
            ),
            Some(_) => {}
            None => {
                let issue = record_issue(&record, &columns.well_id, raw_well, RecordIssueKind::UnresolvedWellId);
                logging::log_record_issue(Stage::Reconcile, &issue);
                issues.push(issue);
            }
        }

        let raw_timestamp = required(&record, &columns.timestamp)?;
        let date = self.timestamps.normalize(raw_timestamp);
        if date.is_none() {
            let issue = record_issue(
                &record,
                &columns.timestamp,
                raw_timestamp,
                RecordIssueKind::UnrecognizedTimestamp,
            );
            logging::log_record_issue(Stage::Timestamp, &issue);
            issues.push(issue);
        }

        for column in &columns.numeric {
            let value = required(&record, column)?.trim();
            if !value.is_empty() && value.parse::<f64>().is_err() {
                let issue = record_issue(&record, column, value, RecordIssueKind::InvalidNumber);
                logging::log_record_issue(Stage::Ingest, &issue);
                issues.push(issue);
            }
        }

        let (Some(well), Some(date), true) = (well, date, issues.is_empty()) else {
            return Ok(Err(issues));
        };

        if let Some(date_added) = &columns.date_added {
            record.set(date_added, run_date.format(DATE_FORMAT).to_string());
        }
        let mut canonical =
            CanonicalRecord::from_raw(record, &columns.well_id, well.canonical, &columns.timestamp, date);
        if let Some(output) = &columns.output {
            canonical.fields = project(canonical.line, canonical.fields, output)?;
        }
        Ok(Ok(canonical))
    }
}

fn required<'a>(record: &'a RawRecord, column: &str) -> Result<&'a str> {
    record.get(column).ok_or_else(|| {
        EtlError::SchemaViolation(format!("line {}: missing column '{}'", record.line, column))
    })
}

fn record_issue(record: &RawRecord, column: &str, raw_value: &str, kind: RecordIssueKind) -> RecordIssue {
    RecordIssue {
        line: record.line,
        column: column.to_string(),
        raw_value: raw_value.to_string(),
        kind,
    }
}

/// Reorders `fields` to `output`, dropping everything else.
fn project(
    line: u64,
    mut fields: Vec<(String, String)>,
    output: &[String],
) -> Result<Vec<(String, String)>> {
    let mut projected = Vec::with_capacity(output.len());
    for column in output {
        let index = fields.iter().position(|(name, _)| name == column).ok_or_else(|| {
            EtlError::SchemaViolation(format!("line {}: missing output column '{}'", line, column))
        })?;
        projected.push(fields.swap_remove(index));
    }
    Ok(projected)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
