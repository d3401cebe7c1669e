/// Sample timestamp normalization.
///
/// The BSK portal has emitted sample times as `09/24/2024 14:48`,
/// `9/24/2024 2:48 PM`, ISO datetimes and bare dates depending on export
/// version. The warehouse keys on calendar date, so the time of day is
/// dropped. Only formats on the configured allow-list are accepted; there
/// is no best-effort guessing.
///
/// Two readings of one well on the same day at different times collapse to
/// the same date. They are not de-duplicated here.

use chrono::NaiveDate;
use chrono::format::{Item, StrftimeItems};

use crate::config::TimestampConfig;
use crate::error::{EtlError, Result};

#[derive(Debug, Clone)]
pub struct TimestampNormalizer {
    formats: Vec<String>,
}

impl TimestampNormalizer {
    /// Fails if the allow-list is empty or contains a malformed format
    /// string.
    pub fn from_config(config: &TimestampConfig) -> Result<Self> {
        if config.formats.is_empty() {
            return Err(EtlError::Config("timestamps.formats is empty".to_string()));
        }
        for format in &config.formats {
            if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
                return Err(EtlError::Config(format!(
                    "timestamps.formats: '{}' is not a valid chrono format",
                    format
                )));
            }
        }
        Ok(Self {
            formats: config.formats.clone(),
        })
    }

    /// Returns the calendar date of `raw`, or `None` if no allow-listed
    /// format matches the whole value.
    ///
    /// Time fields are still range-checked (`25:00` is rejected) even
    /// though they are discarded.
    pub fn normalize(&self, raw: &str) -> Option<NaiveDate> {
        let value = raw.trim();
        if value.is_empty() {
            return None;
        }
        self.formats
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
