//! BSK client portal CSV reader.
//!
//! Reads a dropped-off export into `RawRecord`s. Header names are renamed
//! through `columns.rename` first (the portal uses dotted names such as
//! `Sample.SampleName`), then checked against every column the run needs.
//! Any structural problem (missing column, duplicate column, ragged row,
//! undecodable text) is a schema violation and aborts the run before a
//! single record is transformed.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::config::EtlConfig;
use crate::error::{EtlError, Result};
use crate::model::RawRecord;

/// Header and rows of one export, after renaming.
#[derive(Debug, Clone, PartialEq)]
pub struct BskExport {
    pub header: Vec<String>,
    pub records: Vec<RawRecord>,
}

/// Reads and schema-checks an export file.
pub fn read_export(path: &Path, config: &EtlConfig) -> Result<BskExport> {
    let file = File::open(path).map_err(|e| {
        EtlError::SchemaViolation(format!("cannot open export '{}': {}", path.display(), e))
    })?;
    read_export_from(file, config)
}

/// Same as `read_export`, for any reader. Used directly by tests.
pub fn read_export_from<R: Read>(source: R, config: &EtlConfig) -> Result<BskExport> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(source);

    let header: Vec<String> = reader
        .headers()
        .map_err(schema_error)?
        .iter()
        .map(|name| {
            let name = name.trim();
            config
                .columns
                .rename
                .get(name)
                .cloned()
                .unwrap_or_else(|| name.to_string())
        })
        .collect();

    check_header(&header, config)?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(schema_error)?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        let fields = header
            .iter()
            .cloned()
            .zip(row.iter().map(String::from))
            .collect();
        records.push(RawRecord::new(line, fields));
    }

    Ok(BskExport { header, records })
}

/// Verifies the renamed header has every required column exactly once.
pub fn check_header(header: &[String], config: &EtlConfig) -> Result<()> {
    if header.iter().all(|name| name.is_empty()) {
        return Err(EtlError::SchemaViolation("export has no header row".to_string()));
    }

    for (i, name) in header.iter().enumerate() {
        if header[..i].contains(name) {
            return Err(EtlError::SchemaViolation(format!(
                "column '{}' appears more than once after renaming",
                name
            )));
        }
    }

    let missing: Vec<&str> = config
        .required_columns()
        .into_iter()
        .filter(|required| !header.iter().any(|name| name == required))
        .collect();
    if !missing.is_empty() {
        return Err(EtlError::SchemaViolation(format!(
            "missing required column(s): {}",
            missing.join(", ")
        )));
    }
    Ok(())
}

fn schema_error(err: csv::Error) -> EtlError {
    if err.is_io_error() {
        EtlError::Csv(err)
    } else {
        EtlError::SchemaViolation(format!("malformed export: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EtlConfig {
        EtlConfig::from_toml_str(
            r#"
            [columns]
            site = "site"
            well_id = "state_well_number"
            timestamp = "sample_date"
            numeric = ["result"]

            [columns.rename]
            "Sample.Site" = "site"
            "Sample.SampleName" = "state_well_number"
            "Sample.Sampled" = "sample_date"
            "Analyte.tResult" = "result"

            [wells]
            grammar = 'W\d{3}'
            "#,
        )
        .expect("test config should parse")
    }

    #[test]
    fn test_headers_are_renamed_and_rows_keep_line_numbers() {
        let csv = "Sample.Site,Sample.SampleName,Sample.Sampled,Analyte.Analyte,Analyte.tResult\n\
                   KWB,W-12,09/24/2024 14:48,Nitrate,4.1\n\
                   KWB,W013,09/25/2024 08:00,Arsenic,\n";
        let export = read_export_from(csv.as_bytes(), &config()).expect("export should parse");

        assert_eq!(
            export.header,
            vec!["site", "state_well_number", "sample_date", "Analyte.Analyte", "result"]
        );
        assert_eq!(export.records.len(), 2);
        assert_eq!(export.records[0].line, 2);
        assert_eq!(export.records[1].line, 3);
        assert_eq!(export.records[0].get("state_well_number"), Some("W-12"));
        assert_eq!(export.records[1].get("result"), Some(""));
    }

    #[test]
    fn test_values_are_not_trimmed_on_read() {
        let csv = "site,state_well_number,sample_date,result\nKWB,\" W12 \",2024-09-24,1\n";
        let export = read_export_from(csv.as_bytes(), &config()).unwrap();
        assert_eq!(export.records[0].get("state_well_number"), Some(" W12 "));
    }

    #[test]
    fn test_missing_site_column_is_a_schema_violation() {
        let csv = "Sample.SampleName,Sample.Sampled,Analyte.tResult\nW012,2024-09-24,1\n";
        let err = read_export_from(csv.as_bytes(), &config()).unwrap_err();
        match err {
            EtlError::SchemaViolation(msg) => assert!(msg.contains("site"), "got: {}", msg),
            other => panic!("expected SchemaViolation, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_numeric_column_is_a_schema_violation() {
        let csv = "site,state_well_number,sample_date\nKWB,W012,2024-09-24\n";
        let err = read_export_from(csv.as_bytes(), &config()).unwrap_err();
        assert!(err.to_string().contains("result"), "got: {}", err);
    }

    #[test]
    fn test_duplicate_column_after_rename_is_a_schema_violation() {
        let csv = "site,Sample.Site,state_well_number,sample_date,result\nA,B,W012,2024-09-24,1\n";
        let err = read_export_from(csv.as_bytes(), &config()).unwrap_err();
        assert!(matches!(err, EtlError::SchemaViolation(_)));
    }

    #[test]
    fn test_ragged_row_is_a_schema_violation() {
        let csv = "site,state_well_number,sample_date,result\nKWB,W012,2024-09-24\n";
        let err = read_export_from(csv.as_bytes(), &config()).unwrap_err();
        assert!(matches!(err, EtlError::SchemaViolation(_)), "got {:?}", err);
    }

    #[test]
    fn test_empty_file_is_a_schema_violation() {
        let err = read_export_from("".as_bytes(), &config()).unwrap_err();
        assert!(matches!(err, EtlError::SchemaViolation(_)));
    }

    #[test]
    fn test_missing_file_is_a_schema_violation() {
        let err = read_export(Path::new("/nonexistent/export.csv"), &config()).unwrap_err();
        assert!(matches!(err, EtlError::SchemaViolation(_)));
    }
}
