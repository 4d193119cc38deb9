//! Open-Meteo historical weather client
//!
//! Retrieves hourly weather for one calendar day at one position. The API
//! answers with parallel arrays under `hourly` (one per requested field,
//! plus `time`), which we zip into one `HourlySample` per hour.
//!
//! API Documentation: https://open-meteo.com/en/docs/historical-weather-api

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;

use super::{WeatherSource, parse_json, send_for_text};
use crate::logging::{self, DataSource};
use crate::model::{Coordinates, HourlySample, ProviderError};
use crate::providers::{OPEN_METEO_HOURLY_PARAMS, join_params};
use crate::rate_limit::RateLimiter;

// ============================================================================
// API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    hourly: Option<HourlyBlock>,
}

/// The `hourly` object: parallel arrays aligned by index.
#[derive(Debug, Deserialize)]
pub struct HourlyBlock {
    pub time: Vec<String>,
    pub temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    pub apparent_temperature: Option<Vec<Option<f64>>>,
    pub precipitation: Vec<Option<f64>>,
    pub rain: Vec<Option<f64>>,
}

// ============================================================================
// Zipping
// ============================================================================

/// Zips the parallel arrays into one sample per hour.
///
/// Returns the samples and whether the array lengths disagreed. Mismatched
/// arrays are zipped to the shortest so every sample's fields come from the
/// same index. A missing `apparent_temperature` array does not shorten the
/// result; that field is `None` throughout.
pub fn zip_hourly(block: HourlyBlock) -> (Vec<HourlySample>, bool) {
    let mut lengths = vec![
        block.time.len(),
        block.temperature_2m.len(),
        block.precipitation.len(),
        block.rain.len(),
    ];
    if let Some(apparent) = &block.apparent_temperature {
        lengths.push(apparent.len());
    }
    let shortest = lengths.iter().copied().min().unwrap_or(0);
    let mismatched = lengths.iter().any(|&len| len != shortest);

    let mut apparent = block
        .apparent_temperature
        .map(|values| values.into_iter())
        .into_iter()
        .flatten();

    let samples = block
        .time
        .into_iter()
        .zip(block.temperature_2m)
        .zip(block.precipitation)
        .zip(block.rain)
        .take(shortest)
        .map(|(((time, temperature_2m), precipitation), rain)| HourlySample {
            time,
            temperature_2m,
            apparent_temperature: apparent.next().flatten(),
            precipitation,
            rain,
        })
        .collect();

    (samples, mismatched)
}

/// Parses an Open-Meteo body into hourly samples.
pub fn parse_hourly_response(body: &str) -> Result<Vec<HourlySample>, ProviderError> {
    let response: OpenMeteoResponse = parse_json(body, DataSource::OpenMeteo)?;
    let block = response.hourly.ok_or_else(|| ProviderError::Parse {
        provider: DataSource::OpenMeteo,
        message: "response has no 'hourly' block".to_string(),
    })?;

    let (samples, mismatched) = zip_hourly(block);
    if mismatched {
        logging::warn(
            DataSource::OpenMeteo,
            None,
            &format!(
                "Hourly arrays have different lengths; truncated to {} entries",
                samples.len()
            ),
        );
    }
    Ok(samples)
}

// ============================================================================
// HTTP client
// ============================================================================

pub struct OpenMeteoClient {
    http: reqwest::blocking::Client,
    url: String,
    hourly: String,
    limiter: Option<Arc<RateLimiter>>,
}

impl OpenMeteoClient {
    pub fn new(http: reqwest::blocking::Client, url: &str, limiter: Option<Arc<RateLimiter>>) -> Self {
        Self {
            http,
            url: url.to_string(),
            hourly: join_params(OPEN_METEO_HOURLY_PARAMS),
            limiter,
        }
    }
}

/// Query parameters for one day at one position. Start and end are the
/// same date, so the archive returns that day's 24 hours.
pub fn hourly_query(date: NaiveDate, at: Coordinates, hourly: &str) -> Vec<(&'static str, String)> {
    let day = date.format("%Y-%m-%d").to_string();
    vec![
        ("latitude", at.latitude.to_string()),
        ("longitude", at.longitude.to_string()),
        ("start_date", day.clone()),
        ("end_date", day),
        ("hourly", hourly.to_string()),
    ]
}

impl WeatherSource for OpenMeteoClient {
    fn hourly_weather(
        &self,
        date: NaiveDate,
        at: Coordinates,
    ) -> Result<Vec<HourlySample>, ProviderError> {
        let request = self
            .http
            .get(&self.url)
            .query(&hourly_query(date, at, &self.hourly));

        let body = send_for_text(request, DataSource::OpenMeteo, self.limiter.as_deref())?;
        parse_hourly_response(&body)
    }
}

// ============================================================================
// Tests
// ============================================================================
