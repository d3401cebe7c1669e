//! BSK water-quality transform.
//!
//! Turns the client portal's CSV exports into a canonical record set for
//! the warehouse: drops the excluded site and QC blanks, reconciles well
//! identifiers to state well numbers, and truncates sample timestamps to
//! dates. Per-record failures are reported rather than thrown.

pub mod config;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod load;
pub mod logging;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod timestamps;
pub mod wells;

pub use config::EtlConfig;
pub use error::{EtlError, RecordIssueKind, Result};
pub use model::{CanonicalRecord, RawRecord};
pub use pipeline::{Pipeline, TransformOutput};
pub use report::{ErrorReport, RecordIssue, RunSummary};
