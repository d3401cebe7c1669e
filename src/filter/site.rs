//! Excluded-site filter.

use crate::config::EtlConfig;
use crate::error::{EtlError, Result};
use crate::model::RawRecord;

/// Drops records whose site matches the configured excluded value.
///
/// Values are compared after trimming. Case sensitivity comes from
/// `site.case_sensitive`. With no excluded site configured every record
/// passes, but the site column is still required.
#[derive(Debug, Clone)]
pub struct SiteFilter {
    column: String,
    excluded: Option<String>,
    case_sensitive: bool,
}

impl SiteFilter {
    pub fn from_config(config: &EtlConfig) -> Self {
        Self {
            column: config.columns.site.clone(),
            excluded: config
                .site
                .excluded
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            case_sensitive: config.site.case_sensitive,
        }
    }

    /// Returns `true` if the record comes from the excluded site.
    ///
    /// A record without the site column is a data-contract violation, not
    /// a pass-through.
    pub fn is_excluded(&self, record: &RawRecord) -> Result<bool> {
        let site = record.get(&self.column).ok_or_else(|| {
            EtlError::SchemaViolation(format!(
                "line {}: missing site column '{}'",
                record.line, self.column
            ))
        })?;

        let Some(excluded) = &self.excluded else {
            return Ok(false);
        };
        let site = site.trim();
        Ok(if self.case_sensitive {
            site == excluded
        } else {
            site.eq_ignore_ascii_case(excluded)
        })
    }

    /// Splits off excluded records. Returns the kept records and how many
    /// were dropped.
    pub fn apply(&self, records: Vec<RawRecord>) -> Result<(Vec<RawRecord>, usize)> {
        let total = records.len();
        let mut kept = Vec::with_capacity(total);
        for record in records {
            if !self.is_excluded(&record)? {
                kept.push(record);
            }
        }
        let dropped = total - kept.len();
        Ok((kept, dropped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(excluded: Option<&str>, case_sensitive: bool) -> EtlConfig {
        let mut config = EtlConfig::from_toml_str("[wells]\ngrammar = 'W\\d{3}'\n").unwrap();
        config.site.excluded = excluded.map(String::from);
        config.site.case_sensitive = case_sensitive;
        config
    }

    fn record(line: u64, site: &str) -> RawRecord {
        RawRecord::new(
            line,
            vec![
                ("site".to_string(), site.to_string()),
                ("well_id".to_string(), "W012".to_string()),
            ],
        )
    }

    #[test]
    fn test_excluded_site_records_are_dropped() {
        let filter = SiteFilter::from_config(&config(Some("LAB-QC"), true));
        let records = vec![record(2, "KWB"), record(3, "LAB-QC"), record(4, " LAB-QC "), record(5, "KWB")];

        let (kept, dropped) = filter.apply(records).unwrap();
        assert_eq!(dropped, 2);
        assert!(kept.iter().all(|r| r.get("site") == Some("KWB")));
    }

    #[test]
    fn test_case_sensitive_match_keeps_other_casing() {
        let filter = SiteFilter::from_config(&config(Some("LAB-QC"), true));
        assert!(!filter.is_excluded(&record(2, "lab-qc")).unwrap());
    }

    #[test]
    fn test_case_insensitive_match() {
        let filter = SiteFilter::from_config(&config(Some("LAB-QC"), false));
        assert!(filter.is_excluded(&record(2, "lab-qc")).unwrap());
        assert!(!filter.is_excluded(&record(3, "lab-qc-2")).unwrap());
    }

    #[test]
    fn test_no_excluded_site_passes_everything() {
        let filter = SiteFilter::from_config(&config(None, true));
        let (kept, dropped) = filter.apply(vec![record(2, "KWB"), record(3, "")]).unwrap();
        assert_eq!(kept.len(), 2);
        assert_eq!(dropped, 0);
    }

    #[test]
    fn test_missing_site_column_fails_fast() {
        let filter = SiteFilter::from_config(&config(Some("LAB-QC"), true));
        let bad = RawRecord::new(7, vec![("well_id".to_string(), "W012".to_string())]);

        let err = filter.apply(vec![record(2, "KWB"), bad]).unwrap_err();
        assert!(matches!(err, EtlError::SchemaViolation(_)), "got {:?}", err);
        assert!(err.to_string().contains("line 7"));
    }
}
