//! Quality-control blank filter.
//!
//! Field blanks and trip blanks are shipped in the same export as real
//! samples, with the marker in the well column (or in a sample-type column
//! when the export has one). They have no well and must never reach the
//! warehouse as a measurement.

use crate::config::EtlConfig;
use crate::model::RawRecord;

/// Identifies blank records by exact token or prefix, ASCII
/// case-insensitive, on the trimmed value.
///
/// A value that merely contains a marker is not a blank: `"MW-TB-3"` is
/// a well.
#[derive(Debug, Clone)]
pub struct BlankFilter {
    columns: Vec<String>,
    exact: Vec<String>,
    prefixes: Vec<String>,
}

impl BlankFilter {
    pub fn from_config(config: &EtlConfig) -> Self {
        let mut columns = vec![config.columns.well_id.clone()];
        if let Some(sample_type) = &config.columns.sample_type {
            columns.push(sample_type.clone());
        }
        let clean = |markers: &[String]| -> Vec<String> {
            markers
                .iter()
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect()
        };
        Self {
            columns,
            exact: clean(&config.blanks.exact),
            prefixes: clean(&config.blanks.prefixes),
        }
    }

    /// Returns `true` if `value` is a blank marker.
    pub fn is_marker(&self, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() {
            return false;
        }
        self.exact.iter().any(|token| value.eq_ignore_ascii_case(token))
            || self.prefixes.iter().any(|prefix| {
                value
                    .get(..prefix.len())
                    .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
            })
    }

    pub fn is_blank(&self, record: &RawRecord) -> bool {
        self.columns
            .iter()
            .filter_map(|column| record.get(column))
            .any(|value| self.is_marker(value))
    }

    /// Splits off blanks. Returns the kept records and how many were dropped.
    pub fn apply(&self, records: Vec<RawRecord>) -> (Vec<RawRecord>, usize) {
        let total = records.len();
        let kept: Vec<RawRecord> = records.into_iter().filter(|r| !self.is_blank(r)).collect();
        let dropped = total - kept.len();
        (kept, dropped)
    }
}
