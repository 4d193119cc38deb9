//! Structured logging for the enrichment service
//!
//! Provides context-rich logging tagged with the data source and the
//! incident case number, with severity levels. Supports console output and
//! an optional append-only log file for long batch runs.

use chrono::Utc;
use serde::Deserialize;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::{Mutex, PoisonError};

use crate::model::{ProviderError, Rejection};

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[serde(alias = "warn")]
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
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSource {
    /// Incident CSV input
    Csv,
    /// Case number / time parsing
    Parser,
    /// Address geocoding provider
    Geocoding,
    /// Open-Meteo hourly weather archive
    OpenMeteo,
    /// Stormglass marine weather and tides
    Stormglass,
    /// JSON output writer
    Output,
    System,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Csv => write!(f, "CSV"),
            DataSource::Parser => write!(f, "PARSE"),
            DataSource::Geocoding => write!(f, "GEO"),
            DataSource::OpenMeteo => write!(f, "METEO"),
            DataSource::Stormglass => write!(f, "STORM"),
            DataSource::Output => write!(f, "OUT"),
            DataSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - the provider has no data for this place or day
    Expected,
    /// Unexpected failure - indicates quota, credential, or service problems
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
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

        *LOGGER.lock().unwrap_or_else(PoisonError::into_inner) = Some(logger);
    }

    fn log(&self, level: LogLevel, source: DataSource, case_id: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");

        let case_part = case_id.map(|c| format!(" [{}]", c)).unwrap_or_default();
        let log_entry = format!(
            "{} {} {}{}: {}",
            timestamp, level, source, case_part, message
        );

        if self.console_timestamps {
            match level {
                LogLevel::Error => eprintln!("{}", log_entry),
                LogLevel::Warning => eprintln!("   {}", log_entry),
                LogLevel::Info | LogLevel::Debug => println!("   {}", log_entry),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", source, case_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", source, case_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}{}: {}", source, case_part, message),
            }
        }

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

fn emit(level: LogLevel, source: DataSource, case_id: Option<&str>, message: &str) {
    // Worker threads log concurrently; a panic in one must not silence the rest.
    let guard = LOGGER.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(logger) = guard.as_ref() {
        logger.log(level, source, case_id, message);
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

pub fn info(source: DataSource, case_id: Option<&str>, message: &str) {
    emit(LogLevel::Info, source, case_id, message);
}

pub fn warn(source: DataSource, case_id: Option<&str>, message: &str) {
    emit(LogLevel::Warning, source, case_id, message);
}

pub fn error(source: DataSource, case_id: Option<&str>, message: &str) {
    emit(LogLevel::Error, source, case_id, message);
}

pub fn debug(source: DataSource, case_id: Option<&str>, message: &str) {
    emit(LogLevel::Debug, source, case_id, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a provider failure from its typed error.
///
/// Client errors that mean "nothing here" (an unknown address, a day outside
/// the archive) are expected for a historical dataset. Credential, quota and
/// server errors point at the service or our configuration.
pub fn classify_provider_failure(err: &ProviderError) -> FailureType {
    match err {
        ProviderError::NoResults { .. } => FailureType::Expected,
        ProviderError::HttpStatus { status, .. } => match status {
            400 | 404 | 422 => FailureType::Expected,
            401 | 402 | 403 | 429 => FailureType::Unexpected,
            500..=599 => FailureType::Unexpected,
            _ => FailureType::Unknown,
        },
        ProviderError::Request { .. } | ProviderError::Parse { .. } => FailureType::Unexpected,
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a provider failure with automatic classification
pub fn log_provider_failure(case_id: &str, operation: &str, err: &ProviderError) {
    let failure_type = classify_provider_failure(err);

    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => debug(err.provider(), Some(case_id), &message),
        FailureType::Unexpected => error(err.provider(), Some(case_id), &message),
        FailureType::Unknown => warn(err.provider(), Some(case_id), &message),
    }
}

/// Log why a row was excluded before any network call
pub fn log_rejection(case_id: &str, rejection: &Rejection) {
    let message = format!("Case number {} skipped: {}", case_id, rejection);
    info(DataSource::Parser, Some(case_id), &message);
}

// ---------------------------------------------------------------------------
// Batch Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of a batch run
pub fn log_batch_summary(total: usize, valid: usize, invalid: usize, missing_weather: usize) {
    let message = format!(
        "Batch complete: {}/{} enriched, {} invalid, {} without weather",
        valid, total, invalid, missing_weather
    );

    if invalid == 0 && missing_weather == 0 {
        info(DataSource::System, None, &message);
    } else if valid == 0 && total > 0 {
        error(DataSource::System, None, &message);
    } else {
        warn(DataSource::System, None, &message);
    }
}
