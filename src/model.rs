/// Core data types for the BSK water-quality transform.
///
/// This module defines the shared record model imported by all other
/// modules. It contains no I/O. Column names come from the run
/// configuration.

use chrono::NaiveDate;

/// Output rendering for normalized sample dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ---------------------------------------------------------------------------
// Record types
// ---------------------------------------------------------------------------

/// One row of the BSK export as received, after header renames.
///
/// Fields keep the order of the source header (or of the configured output
/// projection). Values are the raw strings from the file; nothing has been
/// trimmed or interpreted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// 1-based line number in the source file, header included.
    pub line: u64,
    pub fields: Vec<(String, String)>,
}

impl RawRecord {
    pub fn new(line: u64, fields: Vec<(String, String)>) -> Self {
        Self { line, fields }
    }

    /// Returns the raw value for `column`, or `None` if the record has no
    /// such column.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Replaces the value of `column`, appending it if absent.
    pub fn set(&mut self, column: &str, value: String) {
        match self.fields.iter_mut().find(|(name, _)| name == column) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((column.to_string(), value)),
        }
    }
}

/// A record that passed every filter and reconciliation step.
///
/// `fields` carries the same columns as the originating `RawRecord`, with
/// the well column replaced by `well_id` and the timestamp column replaced
/// by `sample_date` rendered as `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    pub line: u64,
    pub well_id: String,
    pub sample_date: NaiveDate,
    pub fields: Vec<(String, String)>,
}

impl CanonicalRecord {
    /// Builds a canonical record from its raw counterpart, substituting the
    /// reconciled well identifier and the normalized date.
    pub fn from_raw(
        mut raw: RawRecord,
        well_column: &str,
        well_id: String,
        timestamp_column: &str,
        sample_date: NaiveDate,
    ) -> Self {
        raw.set(well_column, well_id.clone());
        raw.set(timestamp_column, sample_date.format(DATE_FORMAT).to_string());
        Self {
            line: raw.line,
            well_id,
            sample_date,
            fields: raw.fields,
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawRecord {
        RawRecord::new(
            2,
            vec![
                ("site".to_string(), "KWB".to_string()),
                ("well_id".to_string(), " w12 ".to_string()),
                ("sample_date".to_string(), "09/24/2024 14:48".to_string()),
                ("result".to_string(), "0.42".to_string()),
            ],
        )
    }

    #[test]
    fn test_get_returns_none_for_missing_column() {
        assert_eq!(raw().get("analyte"), None);
        assert_eq!(raw().get("site"), Some("KWB"));
    }

    #[test]
    fn test_set_replaces_in_place_and_appends_new_columns() {
        let mut record = raw();
        record.set("site", "OTHER".to_string());
        record.set("date_added", "2024-09-25".to_string());
        assert_eq!(record.fields[0], ("site".to_string(), "OTHER".to_string()));
        assert_eq!(record.fields.len(), 5);
        assert_eq!(record.get("date_added"), Some("2024-09-25"));
    }

    #[test]
    fn test_canonical_record_replaces_well_and_timestamp_keeping_order() {
        let date = NaiveDate::from_ymd_opt(2024, 9, 24).unwrap();
        let record = CanonicalRecord::from_raw(raw(), "well_id", "W012".to_string(), "sample_date", date);

        let columns: Vec<_> = record.columns().collect();
        assert_eq!(columns, vec!["site", "well_id", "sample_date", "result"]);
        assert_eq!(record.get("well_id"), Some("W012"));
        assert_eq!(record.get("sample_date"), Some("2024-09-24"));
        assert_eq!(record.get("result"), Some("0.42"));
        assert_eq!(record.line, 2);
    }
}
