//! Core data types for the shark incident enrichment service.
//!
//! This module defines the shared domain model imported by all other modules:
//! the raw incident row read from the CSV, the enriched output record, and the
//! typed errors. It contains no logic beyond small helpers and no I/O.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::logging::DataSource;

/// Output timestamp format: ISO 8601 with millisecond precision,
/// e.g. "2021-07-04T14:30:00.000".
pub const OUTPUT_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// One row of the incident dataset, restricted to the columns we use.
///
/// Every field is optional: the CSV export leaves cells empty freely, and
/// the parser decides which absences disqualify a row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncidentRecord {
    pub case_number: Option<String>, // embeds the date, e.g. "2021.07.04.a"
    pub country: Option<String>,
    pub area: Option<String>,
    pub location: Option<String>,
    pub time: Option<String>, // e.g. "14h30", "Around 14h30"
}

impl IncidentRecord {
    /// Builds a record from raw cell values; blank cells become `None`.
    pub fn from_cells(
        case_number: &str,
        country: &str,
        area: &str,
        location: &str,
        time: &str,
    ) -> Self {
        Self {
            case_number: non_blank(case_number),
            country: non_blank(country),
            area: non_blank(area),
            location: non_blank(location),
            time: non_blank(time),
        }
    }
}

/// Returns `None` for empty or whitespace-only cells.
pub fn non_blank(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

// ---------------------------------------------------------------------------
// Enrichment types
// ---------------------------------------------------------------------------

/// WGS84 position resolved by the geocoding provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// One hour of Open-Meteo weather, zipped from the provider's parallel arrays.
///
/// Values are `None` where the provider reports `null` (gaps in the archive).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlySample {
    pub time: String, // provider local ISO time, e.g. "2021-07-04T14:00"
    pub temperature_2m: Option<f64>,
    pub apparent_temperature: Option<f64>,
    pub precipitation: Option<f64>,
    pub rain: Option<f64>,
}

/// Environmental data gathered for one incident day.
///
/// `weather` is always serialized (as `null` when the fetch failed). The
/// marine fields use a nested `Option`: the outer level is `None` when no
/// marine provider is configured and the field is omitted entirely, while
/// `Some(None)` means the provider is configured but the fetch failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnvironmentalSample {
    pub weather: Option<Vec<HourlySample>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marine_weather: Option<Option<Vec<Value>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tide: Option<Option<Vec<Value>>>,
}

/// A fully processed incident, as written to the output document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedRecord {
    pub case_number: String,
    pub country: String,
    pub area: Option<String>,
    pub location: String,
    pub datetime: String, // OUTPUT_DATETIME_FORMAT
    pub coordinates: Coordinates,
    #[serde(flatten)]
    pub environment: EnvironmentalSample,
}

impl EnrichedRecord {
    /// Returns the name of the first non-finite numeric field, if any.
    ///
    /// JSON has no representation for NaN or infinity and serde_json would
    /// silently write them as `null`, so the writer checks every record first.
    /// Pass-through provider payloads are `serde_json::Value`, which cannot
    /// hold non-finite numbers, so only typed fields are inspected.
    pub fn first_non_finite_field(&self) -> Option<String> {
        if !self.coordinates.latitude.is_finite() {
            return Some("coordinates.latitude".to_string());
        }
        if !self.coordinates.longitude.is_finite() {
            return Some("coordinates.longitude".to_string());
        }

        let samples = self.environment.weather.as_deref().unwrap_or_default();
        for (i, sample) in samples.iter().enumerate() {
            let fields = [
                ("temperature_2m", sample.temperature_2m),
                ("apparent_temperature", sample.apparent_temperature),
                ("precipitation", sample.precipitation),
                ("rain", sample.rain),
            ];
            for (name, value) in fields {
                if value.is_some_and(|v| !v.is_finite()) {
                    return Some(format!("weather[{}].{}", i, name));
                }
            }
        }

        None
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Why the parser discarded a row. Rejections are expected outcomes, not
/// failures: the row is logged and excluded from the output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("missing {0}")]
    MissingField(&'static str),
    #[error("case number has no YYYY.MM.DD date")]
    NoDatePattern,
    #[error("time has no HHhMM time")]
    NoTimePattern,
    #[error("invalid date/time '{value}': {reason}")]
    InvalidDateTime { value: String, reason: String },
    #[error("{date} is before the historical data floor {floor}")]
    BeforeHistoricalFloor { date: NaiveDate, floor: NaiveDate },
}

/// Errors from a single request to an external provider.
///
/// These are always row-scoped: a geocoding error drops the row, an
/// environmental error nulls one field of the record.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Non-2xx HTTP response. `body` is truncated for logging.
    #[error("HTTP error from {provider}: {status} {body}")]
    HttpStatus {
        provider: DataSource,
        status: u16,
        body: String,
    },
    /// The request never produced a response (connect, TLS, timeout).
    #[error("Request to {provider} failed: {source}")]
    Request {
        provider: DataSource,
        #[source]
        source: reqwest::Error,
    },
    /// The response body could not be deserialized.
    #[error("Parse error from {provider}: {message}")]
    Parse { provider: DataSource, message: String },
    /// The provider answered but had nothing for the query.
    #[error("No results from {provider} for '{query}'")]
    NoResults { provider: DataSource, query: String },
}

impl ProviderError {
    pub fn provider(&self) -> DataSource {
        match self {
            ProviderError::HttpStatus { provider, .. }
            | ProviderError::Request { provider, .. }
            | ProviderError::Parse { provider, .. }
            | ProviderError::NoResults { provider, .. } => *provider,
        }
    }
}

/// Fatal errors that abort the whole batch.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to read input '{path}': {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("Input '{path}' is missing required column '{column}'")]
    MissingColumn { path: String, column: &'static str },
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Refusing to write non-finite value in {field} of case {case_number}")]
    NonFiniteValue { case_number: String, field: String },
    #[error("Failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}
