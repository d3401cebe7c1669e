//! One end-to-end run: read the export, transform, write the hand-off
//! files, optionally load.
//!
//! The error report is written for every run that gets past the schema
//! check, including aborted ones, so the offending values are always on
//! disk next to where the output would have been. An aborted run removes
//! any data file of the same name left by an earlier run.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::config::EtlConfig;
use crate::error::{EtlError, Result};
use crate::ingest::bsk;
use crate::load::Warehouse;
use crate::logging::{self, Stage};
use crate::output;
use crate::pipeline::{Pipeline, TransformOutput};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input: PathBuf,
    /// Overrides `run.output_dir`.
    pub output_dir: Option<PathBuf>,
    pub run_date: NaiveDate,
    pub load: bool,
}

#[derive(Debug)]
pub struct RunResult {
    pub output: TransformOutput,
    pub columns: Vec<String>,
    pub data_path: PathBuf,
    pub report_path: PathBuf,
    /// Rows the warehouse accepted, when loading was requested.
    pub loaded: Option<u64>,
}

/// Output column order: the configured projection, or the input header
/// with the `date_added` column appended when configured.
pub fn output_columns(config: &EtlConfig, header: &[String]) -> Vec<String> {
    if let Some(output) = &config.columns.output {
        return output.clone();
    }
    let mut columns = header.to_vec();
    if let Some(date_added) = &config.columns.date_added {
        if !columns.contains(date_added) {
            columns.push(date_added.clone());
        }
    }
    columns
}

pub fn execute(pipeline: &Pipeline, options: &RunOptions) -> Result<RunResult> {
    let config = pipeline.config();
    let dir: &Path = options
        .output_dir
        .as_deref()
        .unwrap_or(config.run.output_dir.as_path());
    let data_path = output::data_path(dir, &config.run.file_stem, options.run_date);
    let report_path = output::report_path(dir, &config.run.file_stem, options.run_date);

    let export = bsk::read_export(&options.input, config)?;
    logging::info(
        Stage::Ingest,
        None,
        &format!("read {} rows from {}", export.records.len(), options.input.display()),
    );
    let columns = output_columns(config, &export.header);

    let transformed = match pipeline.transform(export.records, options.run_date) {
        Ok(out) => out,
        Err(EtlError::Aborted { report, summary }) => {
            if data_path.exists() {
                fs::remove_file(&data_path)?;
                logging::warn(
                    Stage::Output,
                    None,
                    &format!("removed stale {}", data_path.display()),
                );
            }
            output::write_report(&report_path, &options.input, options.run_date, &summary, &report)?;
            logging::error(
                Stage::Output,
                None,
                &format!("run aborted, no output written; report at {}", report_path.display()),
            );
            return Err(EtlError::Aborted { report, summary });
        }
        Err(e) => return Err(e),
    };

    let written = output::write_parquet(&data_path, &columns, &transformed.records, config)?;
    output::write_report(
        &report_path,
        &options.input,
        options.run_date,
        &transformed.summary,
        &transformed.report,
    )?;
    logging::info(
        Stage::Output,
        None,
        &format!("wrote {} rows to {}", written, data_path.display()),
    );

    let loaded = if options.load {
        let mut warehouse = Warehouse::connect_from_env()?;
        let rows = warehouse.load(&config.run.table, &columns, &transformed.records)?;
        logging::info(
            Stage::Load,
            None,
            &format!("loaded {} rows into {}", rows, config.run.table),
        );
        match warehouse.loaded_through(&config.run.table, &config.columns.timestamp) {
            Ok(Some(through)) => logging::debug(
                Stage::Load,
                None,
                &format!("{} now covers samples through {}", config.run.table, through),
            ),
            Ok(None) => {}
            Err(e) => logging::warn(
                Stage::Load,
                Some(&config.run.table),
                &format!("could not read latest sample date: {}", e),
            ),
        }
        Some(rows)
    } else {
        None
    };

    Ok(RunResult {
        output: transformed,
        columns,
        data_path,
        report_path,
        loaded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(extra: &str) -> EtlConfig {
        EtlConfig::from_toml_str(&format!("[wells]\ngrammar = 'W\\d{{3}}'\n{}", extra)).unwrap()
    }

    fn header() -> Vec<String> {
        ["site", "well_id", "timestamp", "result"].iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_output_columns_default_to_header() {
        assert_eq!(output_columns(&config(""), &header()), header());
    }

    #[test]
    fn test_output_columns_append_date_added() {
        let cols = output_columns(&config("[columns]\ndate_added = 'date_added'\n"), &header());
        assert_eq!(cols.last().map(String::as_str), Some("date_added"));
        assert_eq!(cols.len(), 5);
    }

    #[test]
    fn test_output_columns_follow_projection() {
        let cols = output_columns(&config("[columns]\noutput = ['well_id', 'result']\n"), &header());
        assert_eq!(cols, vec!["well_id".to_string(), "result".to_string()]);
    }
}
