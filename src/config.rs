//! Run configuration for the BSK transform.
//!
//! Everything that encodes a business rule lives here rather than in the
//! transformation code: column names, the excluded site, blank markers, the
//! well-identifier mapping table and grammar, and the timestamp allow-list.
//! The file is TOML; the well mapping may additionally be kept in a
//! two-column CSV (`variant,canonical`) referenced by `wells.mapping_file`
//! so it can be audited and edited on its own.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{EtlError, Result};

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EtlConfig {
    #[serde(default)]
    pub columns: ColumnsConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub blanks: BlankConfig,
    pub wells: WellsConfig,
    #[serde(default)]
    pub timestamps: TimestampConfig,
    #[serde(default)]
    pub run: RunConfig,
}

/// Column names after renaming, plus the renames themselves.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ColumnsConfig {
    pub site: String,
    pub well_id: String,
    pub timestamp: String,
    /// Optional second column checked for blank markers.
    pub sample_type: Option<String>,
    /// Source header → column name.
    pub rename: BTreeMap<String, String>,
    /// Output projection and order. `None` keeps every input column.
    pub output: Option<Vec<String>>,
    /// Columns written as Float64; empty cells become null.
    pub numeric: Vec<String>,
    /// Records with an empty value in any of these are dropped.
    pub non_null: Vec<String>,
    /// When set, a column stamped with the run date is appended.
    pub date_added: Option<String>,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            site: "site".to_string(),
            well_id: "well_id".to_string(),
            timestamp: "timestamp".to_string(),
            sample_type: None,
            rename: BTreeMap::new(),
            output: None,
            numeric: Vec::new(),
            non_null: Vec::new(),
            date_added: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SiteConfig {
    pub excluded: Option<String>,
    pub case_sensitive: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            excluded: None,
            case_sensitive: true,
        }
    }
}

/// QC blank markers. Matching is exact or prefix, never substring.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BlankConfig {
    pub exact: Vec<String>,
    pub prefixes: Vec<String>,
}

impl Default for BlankConfig {
    fn default() -> Self {
        Self {
            exact: vec![
                "FB".to_string(),
                "TB".to_string(),
                "Field Blank".to_string(),
                "Trip Blank".to_string(),
            ],
            prefixes: vec![
                "Field Blank".to_string(),
                "Trip Blank".to_string(),
                "TCP".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WellsConfig {
    /// Regular expression for a canonical identifier. Anchored on compile.
    pub grammar: String,
    /// Characters removed when building a lookup key.
    #[serde(default = "default_strip_chars")]
    pub strip_chars: String,
    /// When an identifier lacks this separator, its first internal
    /// whitespace run is read as one (`"30S/25E 15H01"` → `"30S/25E-15H01"`).
    #[serde(default)]
    pub whitespace_separator: Option<char>,
    /// Known source-side variant → canonical identifier.
    #[serde(default)]
    pub mapping: BTreeMap<String, String>,
    /// Known wrong prefix → correct prefix (e.g. transposed township/range).
    #[serde(default)]
    pub prefix_aliases: BTreeMap<String, String>,
    /// Optional CSV with `variant,canonical` rows, relative to the config file.
    #[serde(default)]
    pub mapping_file: Option<PathBuf>,
}

fn default_strip_chars() -> String {
    " -_.".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TimestampConfig {
    /// chrono format strings, tried in order.
    pub formats: Vec<String>,
}

impl Default for TimestampConfig {
    fn default() -> Self {
        Self {
            formats: [
                "%m/%d/%Y %H:%M",
                "%m/%d/%Y %H:%M:%S",
                "%m/%d/%Y %I:%M %p",
                "%m/%d/%Y %I:%M:%S %p",
                "%m/%d/%Y",
                "%Y-%m-%d %H:%M:%S",
                "%Y-%m-%d %H:%M",
                "%Y-%m-%dT%H:%M:%S",
                "%Y-%m-%d",
            ]
            .iter()
            .map(|f| f.to_string())
            .collect(),
        }
    }
}

/// What a non-empty error report does to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Drop offending records, write the rest, always report.
    ExcludeAndReport,
    /// Any per-record error fails the run with no output.
    Abort,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RunConfig {
    pub error_policy: ErrorPolicy,
    pub output_dir: PathBuf,
    pub file_stem: String,
    /// Destination table for the loader, schema-qualified.
    pub table: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            error_policy: ErrorPolicy::ExcludeAndReport,
            output_dir: PathBuf::from("data_dump"),
            file_stem: "bsk_cleaned_data".to_string(),
            table: "water_quality.bsk_lab_results".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl EtlConfig {
    /// Reads a TOML configuration file and, if referenced, its well mapping
    /// CSV.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let mut config = Self::from_toml_str(&text)?;

        if let Some(mapping_file) = config.wells.mapping_file.clone() {
            let resolved = match path.parent() {
                Some(dir) if mapping_file.is_relative() => dir.join(&mapping_file),
                _ => mapping_file,
            };
            let entries = load_mapping_csv(&resolved)?;
            config.wells.merge_mapping(entries)?;
        }

        Ok(config)
    }

    /// Parses configuration text without touching the filesystem.
    /// `wells.mapping_file` is ignored here; use `load` for that.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EtlConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let c = &self.columns;
        for (role, name) in [
            ("site", &c.site),
            ("well_id", &c.well_id),
            ("timestamp", &c.timestamp),
        ] {
            if name.trim().is_empty() {
                return Err(EtlError::Config(format!("columns.{} must not be empty", role)));
            }
        }
        if c.site == c.well_id || c.site == c.timestamp || c.well_id == c.timestamp {
            return Err(EtlError::Config(
                "columns.site, columns.well_id and columns.timestamp must be distinct".to_string(),
            ));
        }
        if self.timestamps.formats.is_empty() {
            return Err(EtlError::Config("timestamps.formats must list at least one format".to_string()));
        }
        if self.wells.grammar.trim().is_empty() {
            return Err(EtlError::Config("wells.grammar must not be empty".to_string()));
        }
        if self.run.file_stem.trim().is_empty() {
            return Err(EtlError::Config("run.file_stem must not be empty".to_string()));
        }
        Ok(())
    }

    /// Columns that must be present in the input header, in the order they
    /// should be reported when missing.
    pub fn required_columns(&self) -> Vec<&str> {
        let c = &self.columns;
        let mut required: Vec<&str> = vec![c.site.as_str(), c.well_id.as_str(), c.timestamp.as_str()];
        if let Some(sample_type) = &c.sample_type {
            required.push(sample_type.as_str());
        }
        let generated = c.date_added.as_deref();
        let extra = c
            .output
            .iter()
            .flatten()
            .chain(c.numeric.iter())
            .chain(c.non_null.iter())
            .map(String::as_str)
            .filter(|name| Some(*name) != generated);
        for name in extra {
            if !required.contains(&name) {
                required.push(name);
            }
        }
        required
    }
}

impl WellsConfig {
    /// Adds entries from an external mapping table. A variant already
    /// present with a different canonical value is a conflict.
    pub fn merge_mapping(&mut self, entries: Vec<(String, String)>) -> Result<()> {
        for (variant, canonical) in entries {
            match self.mapping.get(&variant) {
                Some(existing) if existing != &canonical => {
                    return Err(EtlError::Config(format!(
                        "well mapping conflict for '{}': '{}' vs '{}'",
                        variant, existing, canonical
                    )));
                }
                _ => {
                    self.mapping.insert(variant, canonical);
                }
            }
        }
        Ok(())
    }
}

fn load_mapping_csv(path: &Path) -> Result<Vec<(String, String)>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| {
            EtlError::Config(format!("Failed to read well mapping '{}': {}", path.display(), e))
        })?;

    let mut entries = Vec::new();
    for row in reader.records() {
        let row = row?;
        match (row.get(0), row.get(1)) {
            (Some(variant), Some(canonical)) if !variant.is_empty() && !canonical.is_empty() => {
                entries.push((variant.to_string(), canonical.to_string()));
            }
            _ => {
                let line = row.position().map(|p| p.line()).unwrap_or(0);
                return Err(EtlError::Config(format!(
                    "well mapping '{}' line {}: expected 'variant,canonical'",
                    path.display(),
                    line
                )));
            }
        }
    }
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
