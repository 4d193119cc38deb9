//! Data ingestion: the incident CSV and the external provider clients.
//!
//! Submodules:
//! - `incidents`: reads the incident CSV into `IncidentRecord`s.
//! - `geocoding`: address → coordinates.
//! - `open_meteo`: hourly weather for one day.
//! - `stormglass`: marine weather hours and tide extremes for one day.
//!
//! The traits below are the seams the pipeline depends on. The HTTP clients
//! implement them; tests substitute in-process fakes.

pub mod geocoding;
pub mod incidents;
pub mod open_meteo;
pub mod stormglass;

use chrono::NaiveDate;
use serde_json::Value;

use crate::environment::DayWindow;
use crate::logging::DataSource;
use crate::model::{Coordinates, HourlySample, ProviderError};
use crate::rate_limit::RateLimiter;

/// Error bodies are logged; keep them to a readable size.
const MAX_ERROR_BODY_CHARS: usize = 300;

// ============================================================================
// Provider seams
// ============================================================================

/// Resolves a free-text address to a single position.
pub trait Geocoder: Send + Sync {
    fn geocode(&self, address: &str) -> Result<Coordinates, ProviderError>;
}

impl<G: Geocoder + ?Sized> Geocoder for &G {
    fn geocode(&self, address: &str) -> Result<Coordinates, ProviderError> {
        (**self).geocode(address)
    }
}

/// Hourly weather for one calendar day.
pub trait WeatherSource: Send + Sync {
    fn hourly_weather(
        &self,
        date: NaiveDate,
        at: Coordinates,
    ) -> Result<Vec<HourlySample>, ProviderError>;
}

/// Marine weather and tide extremes for one day window. Payloads are passed
/// through unmodified.
pub trait MarineSource: Send + Sync {
    fn marine_weather(&self, day: &DayWindow, at: Coordinates)
    -> Result<Vec<Value>, ProviderError>;

    fn tide_extremes(&self, day: &DayWindow, at: Coordinates) -> Result<Vec<Value>, ProviderError>;
}

// ============================================================================
// Shared HTTP helpers
// ============================================================================

/// Sends a prepared request and returns the body of a 2xx response.
///
/// Waits on the shared limiter first. Non-2xx responses become
/// `ProviderError::HttpStatus` carrying a truncated body.
pub(crate) fn send_for_text(
    request: reqwest::blocking::RequestBuilder,
    provider: DataSource,
    limiter: Option<&RateLimiter>,
) -> Result<String, ProviderError> {
    if let Some(limiter) = limiter {
        limiter.acquire();
    }

    let response = request
        .header("Accept", "application/json")
        .send()
        .map_err(|source| ProviderError::Request { provider, source })?;

    let status = response.status();
    let body = response
        .text()
        .map_err(|source| ProviderError::Request { provider, source })?;

    if !status.is_success() {
        return Err(ProviderError::HttpStatus {
            provider,
            status: status.as_u16(),
            body: truncate(&body, MAX_ERROR_BODY_CHARS),
        });
    }

    Ok(body)
}

/// Deserializes a provider body, mapping failures to `ProviderError::Parse`.
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    body: &str,
    provider: DataSource,
) -> Result<T, ProviderError> {
    serde_json::from_str(body).map_err(|e| ProviderError::Parse {
        provider,
        message: e.to_string(),
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::test_server::{client, serve_once};
    use super::*;

    #[test]
    fn test_truncate_keeps_short_bodies() {
        assert_eq!(truncate("  {\"error\":true}\n", 50), "{\"error\":true}");
    }

    #[test]
    fn test_truncate_cuts_on_char_boundary() {
        let body = "é".repeat(10);
        assert_eq!(truncate(&body, 3), "ééé…");
    }

    #[test]
    fn test_parse_json_maps_errors_to_provider() {
        let result: Result<Value, _> = parse_json("not json", DataSource::OpenMeteo);
        match result {
            Err(ProviderError::Parse { provider, .. }) => assert_eq!(provider, DataSource::OpenMeteo),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_server_error_becomes_http_status() {
        let (url, server) = serve_once("500 Internal Server Error", "upstream exploded");
        let request = client().get(&url);

        match send_for_text(request, DataSource::Geocoding, None) {
            Err(ProviderError::HttpStatus { provider, status, body }) => {
                assert_eq!(provider, DataSource::Geocoding);
                assert_eq!(status, 500);
                assert_eq!(body, "upstream exploded");
            }
            other => panic!("expected HttpStatus, got {:?}", other),
        }
        server.join().unwrap();
    }

    #[test]
    fn test_success_returns_body_and_sends_accept_header() {
        let (url, server) = serve_once("200 OK", r#"{"ok":true}"#);
        let request = client().get(&url);
        let limiter = RateLimiter::new(std::time::Duration::from_millis(1));

        let body = send_for_text(request, DataSource::OpenMeteo, Some(&limiter)).unwrap();
        assert_eq!(body, r#"{"ok":true}"#);
        let head = server.join().unwrap().to_lowercase();
        assert!(head.contains("accept: application/json"), "{}", head);
    }
}
