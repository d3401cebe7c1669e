/// Structured logging for the water-quality transform
///
/// Provides context-rich logging tagged with the pipeline stage and, where
/// relevant, the well identifier or source line. Supports both console
/// output and an append-only log file for scheduled runs.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

use crate::report::{ErrorReport, RecordIssue, RunSummary};

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ingest,
    SiteFilter,
    BlankFilter,
    Reconcile,
    Timestamp,
    Output,
    Load,
    System,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Ingest => write!(f, "INGEST"),
            Stage::SiteFilter => write!(f, "SITE"),
            Stage::BlankFilter => write!(f, "BLANK"),
            Stage::Reconcile => write!(f, "WELL"),
            Stage::Timestamp => write!(f, "DATE"),
            Stage::Output => write!(f, "OUT"),
            Stage::Load => write!(f, "DB"),
            Stage::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Run Outcome Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every surviving record was written, nothing reported
    Clean,
    /// Some records were written, some rejected
    Partial,
    /// Records were rejected and nothing was written
    Failed,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Clean => write!(f, "CLEAN"),
            RunOutcome::Partial => write!(f, "PARTIAL"),
            RunOutcome::Failed => write!(f, "FAILED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        if let Ok(mut guard) = LOGGER.lock() {
            *guard = Some(logger);
        }
    }

    fn log(&self, level: LogLevel, stage: Stage, context: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");

        let context_part = context.map(|s| format!(" [{}]", s)).unwrap_or_default();
        let log_entry = format!(
            "{} {} {}{}: {}",
            timestamp, level, stage, context_part, message
        );

        // Console output
        if self.console_timestamps {
            match level {
                LogLevel::Error => eprintln!("{}", log_entry),
                LogLevel::Warning => eprintln!("   {}", log_entry),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}", message),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", stage, context_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", stage, context_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => {} // Skip debug in non-timestamp mode
            }
        }

        // File output
        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

fn emit(level: LogLevel, stage: Stage, context: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, stage, context, message);
        }
    }
}

/// Log a general informational message
pub fn info(stage: Stage, context: Option<&str>, message: &str) {
    emit(LogLevel::Info, stage, context, message);
}

/// Log a warning message
pub fn warn(stage: Stage, context: Option<&str>, message: &str) {
    emit(LogLevel::Warning, stage, context, message);
}

/// Log an error message
pub fn error(stage: Stage, context: Option<&str>, message: &str) {
    emit(LogLevel::Error, stage, context, message);
}

/// Log a debug message
pub fn debug(stage: Stage, context: Option<&str>, message: &str) {
    emit(LogLevel::Debug, stage, context, message);
}

// ---------------------------------------------------------------------------
// Record and Run Logging
// ---------------------------------------------------------------------------

/// Log a rejected record under the stage that rejected it
pub fn log_record_issue(stage: Stage, issue: &RecordIssue) {
    let context = format!("line {}", issue.line);
    let message = format!("{} in '{}': {:?}", issue.kind, issue.column, issue.raw_value);
    warn(stage, Some(&context), &message);
}

/// Log how many records a filter dropped
pub fn log_stage_count(stage: Stage, dropped: usize, remaining: usize) {
    let message = format!("dropped {}, {} remaining", dropped, remaining);
    if dropped == 0 {
        debug(stage, None, &message);
    } else {
        info(stage, None, &message);
    }
}

pub fn classify_run(summary: &RunSummary, report: &ErrorReport) -> RunOutcome {
    if report.is_empty() {
        RunOutcome::Clean
    } else if summary.written == 0 {
        RunOutcome::Failed
    } else {
        RunOutcome::Partial
    }
}

/// Log a summary of the transform run
pub fn log_run_summary(summary: &RunSummary, report: &ErrorReport) {
    let outcome = classify_run(summary, report);
    let message = format!(
        "Transform {}: {}/{} written, {} excluded site, {} blank, {} missing value, {} rejected, {} withheld",
        outcome,
        summary.written,
        summary.rows_read,
        summary.excluded_site,
        summary.blanks,
        summary.missing_values,
        summary.errored,
        summary.withheld
    );

    match outcome {
        RunOutcome::Clean => info(Stage::System, None, &message),
        RunOutcome::Partial => warn(Stage::System, None, &message),
        RunOutcome::Failed => error(Stage::System, None, &message),
    }
}
