//! Run-level reporting: the itemized per-record error report and the stage
//! counts for a single transform run.

use serde::Serialize;

use crate::error::RecordIssueKind;

// ---------------------------------------------------------------------------
// Error report
// ---------------------------------------------------------------------------

/// A single rejected record, naming the offending raw value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordIssue {
    /// 1-based source line.
    pub line: u64,
    pub column: String,
    pub raw_value: String,
    pub kind: RecordIssueKind,
}

/// Per-record errors accumulated over a run, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub issues: Vec<RecordIssue>,
}

impl ErrorReport {
    pub fn push(&mut self, issue: RecordIssue) {
        self.issues.push(issue);
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn count_of(&self, kind: &RecordIssueKind) -> usize {
        self.issues.iter().filter(|i| &i.kind == kind).count()
    }

    /// Distinct offending raw values for one issue kind, first-seen order.
    /// This is the list that gets added to the well mapping table.
    pub fn raw_values(&self, kind: &RecordIssueKind) -> Vec<&str> {
        let mut values: Vec<&str> = Vec::new();
        for issue in self.issues.iter().filter(|i| &i.kind == kind) {
            if !values.contains(&issue.raw_value.as_str()) {
                values.push(&issue.raw_value);
            }
        }
        values
    }
}

// ---------------------------------------------------------------------------
// Run summary
// ---------------------------------------------------------------------------

/// How many records each stage consumed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub rows_read: usize,
    pub excluded_site: usize,
    pub blanks: usize,
    pub missing_values: usize,
    pub errored: usize,
    /// Passed every stage but not written because the run aborted.
    pub withheld: usize,
    pub written: usize,
}

impl RunSummary {
    /// Every row read is accounted for by exactly one outcome.
    pub fn is_balanced(&self) -> bool {
        self.rows_read
            == self.excluded_site
                + self.blanks
                + self.missing_values
                + self.errored
                + self.withheld
                + self.written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(line: u64, raw: &str, kind: RecordIssueKind) -> RecordIssue {
        RecordIssue {
            line,
            column: "well_id".to_string(),
            raw_value: raw.to_string(),
            kind,
        }
    }

    #[test]
    fn test_counts_and_distinct_raw_values() {
        let mut report = ErrorReport::default();
        assert!(report.is_empty());

        report.push(issue(3, "W-999-X", RecordIssueKind::UnresolvedWellId));
        report.push(issue(7, "W-999-X", RecordIssueKind::UnresolvedWellId));
        report.push(issue(9, "yesterday", RecordIssueKind::UnrecognizedTimestamp));

        assert_eq!(report.len(), 3);
        assert_eq!(report.count_of(&RecordIssueKind::UnresolvedWellId), 2);
        assert_eq!(report.count_of(&RecordIssueKind::InvalidNumber), 0);
        assert_eq!(
            report.raw_values(&RecordIssueKind::UnresolvedWellId),
            vec!["W-999-X"]
        );
    }

    #[test]
    fn test_summary_balance() {
        let summary = RunSummary {
            rows_read: 5,
            excluded_site: 1,
            blanks: 1,
            missing_values: 0,
            errored: 1,
            withheld: 0,
            written: 2,
        };
        assert!(summary.is_balanced());
        assert!(!RunSummary { written: 1, ..summary.clone() }.is_balanced());

        let aborted = RunSummary { withheld: 2, written: 0, ..summary };
        assert!(aborted.is_balanced());
    }
}
