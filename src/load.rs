/// Warehouse loader.
///
/// Streams canonical records into PostgreSQL with `COPY ... FROM STDIN`
/// inside a single transaction, so a load either lands completely or not
/// at all. Idempotency across repeated runs is the warehouse table's job
/// (unique constraints / upsert views); this loader only appends.
///
/// Empty and whitespace-only cells load as NULL, matching the Parquet file.

use std::env;
use std::io::Write;

use chrono::NaiveDate;
use postgres::{Client, NoTls};

use crate::error::{EtlError, Result};
use crate::model::CanonicalRecord;

pub struct Warehouse {
    client: Client,
}

impl Warehouse {
    pub fn connect(database_url: &str) -> Result<Self> {
        let client = Client::connect(database_url, NoTls)?;
        Ok(Self { client })
    }

    /// Connects using `DATABASE_URL`, read from the environment or `.env`.
    pub fn connect_from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let url = env::var("DATABASE_URL")
            .map_err(|_| EtlError::Config("DATABASE_URL must be set to load".to_string()))?;
        Self::connect(&url)
    }

    /// Appends `records` to `table`. Returns the row count reported by the
    /// server.
    pub fn load(
        &mut self,
        table: &str,
        columns: &[String],
        records: &[CanonicalRecord],
    ) -> Result<u64> {
        let statement = copy_statement(table, columns)?;

        let mut transaction = self.client.transaction()?;
        let mut sink = transaction.copy_in(statement.as_str())?;
        {
            let mut csv_out = csv::Writer::from_writer(&mut sink);
            for record in records {
                csv_out.write_record(copy_row(record, columns)?)?;
            }
            csv_out.flush()?;
        }
        sink.flush()?;
        let rows = sink.finish()?;
        transaction.commit()?;
        Ok(rows)
    }

    /// Latest sample date present in `table`, if any rows exist.
    pub fn loaded_through(&mut self, table: &str, date_column: &str) -> Result<Option<NaiveDate>> {
        let query = format!(
            "SELECT MAX({}) FROM {}",
            quote_identifier(date_column)?,
            quote_table(table)?
        );
        let row = self.client.query_one(query.as_str(), &[])?;
        Ok(row.get::<_, Option<NaiveDate>>(0))
    }
}

/// `COPY "schema"."table" ("a", "b") FROM STDIN WITH (FORMAT csv, FORCE_NULL ("a", "b"))`
///
/// `FORCE_NULL` makes a quoted empty field NULL too. The csv writer quotes
/// the empty field of a single-column row.
pub fn copy_statement(table: &str, columns: &[String]) -> Result<String> {
    if columns.is_empty() {
        return Err(EtlError::Config("cannot load with no output columns".to_string()));
    }
    let quoted: Vec<String> = columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Result<_>>()?;
    let quoted = quoted.join(", ");
    Ok(format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT csv, FORCE_NULL ({}))",
        quote_table(table)?,
        quoted,
        quoted
    ))
}

/// Field values for one COPY row, in `columns` order. Blank cells become
/// empty fields so they load as NULL.
fn copy_row<'a>(record: &'a CanonicalRecord, columns: &[String]) -> Result<Vec<&'a str>> {
    columns
        .iter()
        .map(|column| {
            let value = record.get(column).ok_or_else(|| {
                EtlError::SchemaViolation(format!(
                    "line {}: missing load column '{}'",
                    record.line, column
                ))
            })?;
            Ok(if value.trim().is_empty() { "" } else { value })
        })
        .collect()
}

fn quote_table(table: &str) -> Result<String> {
    let parts: Vec<String> = table
        .split('.')
        .map(quote_identifier)
        .collect::<Result<_>>()?;
    if parts.len() > 2 {
        return Err(EtlError::Config(format!("table name '{}' has too many parts", table)));
    }
    Ok(parts.join("."))
}

/// Double-quotes an identifier. Only ASCII letters, digits and `_` are
/// accepted, so column names from the export cannot smuggle SQL in.
fn quote_identifier(name: &str) -> Result<String> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if !valid {
        return Err(EtlError::Config(format!("'{}' is not a loadable identifier", name)));
    }
    Ok(format!("\"{}\"", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_copy_statement_quotes_schema_table_and_columns() {
        let stmt = copy_statement(
            "water_quality.bsk_lab_results",
            &cols(&["state_well_number", "sample_date", "result"]),
        )
        .unwrap();
        assert_eq!(
            stmt,
            "COPY \"water_quality\".\"bsk_lab_results\" (\"state_well_number\", \"sample_date\", \"result\") \
             FROM STDIN WITH (FORMAT csv, FORCE_NULL (\"state_well_number\", \"sample_date\", \"result\"))"
        );
    }

    #[test]
    fn test_unqualified_table_is_accepted() {
        let stmt = copy_statement("bsk_lab_results", &cols(&["result"])).unwrap();
        assert!(stmt.starts_with("COPY \"bsk_lab_results\" (\"result\")"));
    }

    #[test]
    fn test_blank_cells_are_written_as_empty_fields() {
        let record = CanonicalRecord {
            line: 2,
            well_id: "W012".to_string(),
            sample_date: NaiveDate::from_ymd_opt(2024, 9, 24).unwrap(),
            fields: vec![
                ("well_id".to_string(), "W012".to_string()),
                ("mdl".to_string(), "   ".to_string()),
                ("units".to_string(), "mg/L".to_string()),
            ],
        };
        let row = copy_row(&record, &cols(&["well_id", "mdl", "units"])).unwrap();
        assert_eq!(row, vec!["W012", "", "mg/L"]);

        let mut out = csv::Writer::from_writer(Vec::new());
        out.write_record(copy_row(&record, &cols(&["mdl"])).unwrap()).unwrap();
        out.flush().unwrap();
        // A lone empty field is quoted; FORCE_NULL covers that case.
        assert_eq!(out.get_ref().as_slice(), b"\"\"\n");
        assert!(copy_statement("t", &cols(&["mdl"])).unwrap().contains("FORCE_NULL (\"mdl\")"));
    }

    #[test]
    fn test_missing_load_column_is_schema_violation() {
        let record = CanonicalRecord {
            line: 7,
            well_id: "W012".to_string(),
            sample_date: NaiveDate::from_ymd_opt(2024, 9, 24).unwrap(),
            fields: vec![("well_id".to_string(), "W012".to_string())],
        };
        let err = copy_row(&record, &cols(&["result"])).unwrap_err();
        assert!(matches!(err, EtlError::SchemaViolation(ref msg) if msg.contains("line 7")));
    }

    #[test]
    fn test_unsafe_identifiers_are_rejected() {
        assert!(copy_statement("t", &cols(&["Analyte.Analyte"])).is_err());
        assert!(copy_statement("t", &cols(&["x\"; DROP TABLE t; --"])).is_err());
        assert!(copy_statement("a.b.c", &cols(&["x"])).is_err());
        assert!(copy_statement("t", &cols(&["1st"])).is_err());
        assert!(copy_statement("t", &[]).is_err());
    }
}
