use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};

use wq_etl::logging::{self, LogLevel, Stage};
use wq_etl::runner::{self, RunOptions};
use wq_etl::{EtlConfig, EtlError, Pipeline, RecordIssueKind};

#[derive(Parser)]
#[command(name = "wq_etl")]
#[command(about = "Transform BSK water-quality exports for the warehouse")]
#[command(version = "0.1.0")]
struct Cli {
    /// Append log entries to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Show debug output with timestamps
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transform one export into a Parquet file and error report
    Transform {
        /// TOML run configuration
        #[arg(long)]
        config: PathBuf,
        /// CSV export from the client portal
        #[arg(long)]
        input: PathBuf,
        /// Overrides run.output_dir from the configuration
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Run date used in file names and date_added (YYYY-MM-DD, default today)
        #[arg(long)]
        run_date: Option<NaiveDate>,
        /// Bulk-load the result into the warehouse (needs DATABASE_URL)
        #[arg(long)]
        load: bool,
    },
    /// Validate a configuration and its well mapping without reading data
    CheckConfig {
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { LogLevel::Debug } else { LogLevel::Info };
    let log_file = cli.log_file.as_ref().map(|p| p.to_string_lossy().into_owned());
    logging::init_logger(level, log_file.as_deref(), cli.verbose);

    let result = match cli.command {
        Commands::Transform {
            config,
            input,
            output_dir,
            run_date,
            load,
        } => transform(config, input, output_dir, run_date, load),
        Commands::CheckConfig { config } => check_config(config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logging::error(Stage::System, None, &e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn transform(
    config: PathBuf,
    input: PathBuf,
    output_dir: Option<PathBuf>,
    run_date: Option<NaiveDate>,
    load: bool,
) -> Result<(), EtlError> {
    let pipeline = Pipeline::new(EtlConfig::load(&config)?)?;
    let options = RunOptions {
        input,
        output_dir,
        run_date: run_date.unwrap_or_else(|| Local::now().date_naive()),
        load,
    };

    let result = runner::execute(&pipeline, &options)?;
    let report = &result.output.report;

    println!("Output:  {}", result.data_path.display());
    println!("Report:  {}", result.report_path.display());
    println!(
        "Records: {} written of {} read",
        result.output.summary.written, result.output.summary.rows_read
    );
    if let Some(rows) = result.loaded {
        println!("Loaded:  {} rows", rows);
    }

    if !report.is_empty() {
        println!("\n⚠️  {} record error(s):", report.len());
        let unresolved = report.raw_values(&RecordIssueKind::UnresolvedWellId);
        if !unresolved.is_empty() {
            println!("   Unmapped well identifiers ({}):", unresolved.len());
            for raw in unresolved {
                println!("   - {:?}", raw);
            }
        }
        let bad_dates = report.count_of(&RecordIssueKind::UnrecognizedTimestamp);
        if bad_dates > 0 {
            println!("   Unrecognized timestamps: {}", bad_dates);
        }
        let bad_numbers = report.count_of(&RecordIssueKind::InvalidNumber);
        if bad_numbers > 0 {
            println!("   Invalid numeric values: {}", bad_numbers);
        }
    }

    Ok(())
}

fn check_config(config: PathBuf) -> Result<(), EtlError> {
    let pipeline = Pipeline::new(EtlConfig::load(&config)?)?;
    let cfg = pipeline.config();
    println!("✓ {} is valid", config.display());
    println!("  Well mapping entries:  {}", pipeline.wells().mapping_len());
    println!("  Prefix aliases:        {}", cfg.wells.prefix_aliases.len());
    println!("  Timestamp formats:     {}", cfg.timestamps.formats.len());
    println!(
        "  Excluded site:         {}",
        cfg.site.excluded.as_deref().unwrap_or("(none)")
    );
    Ok(())
}
