use crate::file_naming::half_hour_timestamps;
use chrono::NaiveDate;
use log::warn;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_EPSILON: f64 = 1e-2;
pub const DEFAULT_REFERENCE_LABEL: &str = "UNICORN";
pub const DEFAULT_CANDIDATE_LABEL: &str = "OPENLF";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid date '{0}', expected YYYYMMDD")]
    InvalidDate(String),
    #[error("invalid year-month '{0}', expected YYYYMM")]
    InvalidYearMonth(String),
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("folder not found: {0}")]
    MissingFolder(PathBuf),
    #[error("invalid timestamp '{0}', expected HHMM")]
    InvalidTimestamp(String),
    #[error("invalid version number '{0}'")]
    InvalidVersion(String),
}

/// Validate a `YYYYMMDD` date string.
pub fn validate_date(date: &str) -> Result<NaiveDate, ConfigError> {
    let trimmed = date.trim();
    if trimmed.len() != 8 {
        return Err(ConfigError::InvalidDate(date.to_string()));
    }
    NaiveDate::parse_from_str(trimmed, "%Y%m%d").map_err(|_| ConfigError::InvalidDate(date.to_string()))
}

/// Validate a `YYYYMM` month string.
pub fn validate_year_month(year_month: &str) -> Result<(), ConfigError> {
    let trimmed = year_month.trim();
    let first_day = format!("{}01", trimmed);
    if trimmed.len() != 6 || NaiveDate::parse_from_str(&first_day, "%Y%m%d").is_err() {
        return Err(ConfigError::InvalidYearMonth(year_month.to_string()));
    }
    Ok(())
}

pub fn require_non_empty(value: &str, field: &'static str) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::EmptyField(field));
    }
    Ok(trimmed.to_string())
}

pub fn require_folder(path: &Path) -> Result<PathBuf, ConfigError> {
    if !path.is_dir() {
        return Err(ConfigError::MissingFolder(path.to_path_buf()));
    }
    Ok(path.to_path_buf())
}

/// Parse a comma-separated `HHMM` list. Blank input yields the 24 half-hour defaults.
pub fn parse_timestamps(input: &str) -> Result<Vec<String>, ConfigError> {
    if input.trim().is_empty() {
        return Ok(half_hour_timestamps());
    }

    input
        .split(',')
        .map(|raw| {
            let ts = raw.trim();
            let valid = ts.len() == 4
                && ts.chars().all(|c| c.is_ascii_digit())
                && ts[..2].parse::<u32>().map_or(false, |h| h < 24)
                && ts[2..].parse::<u32>().map_or(false, |m| m < 60);
            if valid {
                Ok(ts.to_string())
            } else {
                Err(ConfigError::InvalidTimestamp(ts.to_string()))
            }
        })
        .collect()
}

/// Parse a comma-separated version list. Blank input yields `default`.
pub fn parse_version_list(input: &str, default: RangeInclusive<u32>) -> Result<Vec<u32>, ConfigError> {
    if input.trim().is_empty() {
        return Ok(default.collect());
    }

    input
        .split(',')
        .map(|raw| {
            raw.trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidVersion(raw.trim().to_string()))
        })
        .collect()
}

/// Parse an inclusive `start-end` version range.
///
/// Malformed input is not an error: it is logged and `default` is used instead.
pub fn parse_version_range(input: &str, default: RangeInclusive<u32>) -> RangeInclusive<u32> {
    let parsed = input.trim().split_once('-').and_then(|(start, end)| {
        let start = start.trim().parse::<u32>().ok()?;
        let end = end.trim().parse::<u32>().ok()?;
        (start <= end).then_some(start..=end)
    });

    match parsed {
        Some(range) => range,
        None => {
            warn!(
                "Invalid range input '{}'. Using default range {}-{}.",
                input,
                default.start(),
                default.end()
            );
            default
        }
    }
}

/// Run parameters for the reconciliation pipeline.
#[derive(Debug, Clone)]
pub struct ComparisonConfig {
    pub reports_dir: PathBuf,
    pub output_dir: PathBuf,
    pub date: String,
    pub file_type: String,
    pub country_code: String,
    pub versions: Vec<u32>,
    pub timestamps: Vec<String>,
    pub reference_label: String,
    pub candidate_label: String,
    pub epsilon: f64,
}

impl ComparisonConfig {
    pub fn new(
        reports_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        date: &str,
        file_type: &str,
        country_code: &str,
    ) -> Result<Self, ConfigError> {
        let reports_dir = require_folder(&reports_dir.into())?;
        validate_date(date)?;

        Ok(Self {
            reports_dir,
            output_dir: output_dir.into(),
            date: date.trim().to_string(),
            file_type: require_non_empty(file_type, "file type")?,
            country_code: require_non_empty(country_code, "country code")?,
            versions: (0..=14).collect(),
            timestamps: half_hour_timestamps(),
            reference_label: DEFAULT_REFERENCE_LABEL.to_string(),
            candidate_label: DEFAULT_CANDIDATE_LABEL.to_string(),
            epsilon: DEFAULT_EPSILON,
        })
    }

    pub fn with_timestamps(mut self, timestamps: Vec<String>) -> Self {
        if !timestamps.is_empty() {
            self.timestamps = timestamps;
        }
        self
    }

    pub fn with_versions(mut self, versions: Vec<u32>) -> Self {
        if !versions.is_empty() {
            self.versions = versions;
        }
        self
    }

    pub fn with_labels(mut self, reference: &str, candidate: &str) -> Self {
        self.reference_label = reference.to_string();
        self.candidate_label = candidate.to_string();
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon.abs();
        self
    }

    pub fn output_workbook(&self) -> PathBuf {
        self.output_dir
            .join(format!("combined_results_OpenLF_Unicorn_{}", self.date))
    }
}
