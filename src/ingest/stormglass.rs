//! Stormglass marine data client
//!
//! Optional provider for the incident day's marine weather (`/weather/point`)
//! and tide extremes (`/tide/extremes/point`). Both endpoints take the day
//! window as unix timestamps and the API key in the `Authorization` header.
//! Payloads (`hours` and `data`) are passed through unmodified; their shape
//! is keyed by upstream source ("sg", "noaa", ...) and changes per parameter.
//!
//! API Documentation: https://docs.stormglass.io

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use super::{MarineSource, parse_json, send_for_text};
use crate::environment::DayWindow;
use crate::logging::DataSource;
use crate::model::{Coordinates, ProviderError};
use crate::providers::{STORMGLASS_WEATHER_PARAMS, join_params};
use crate::rate_limit::RateLimiter;

// ============================================================================
// API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct WeatherPointResponse {
    hours: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TideExtremesResponse {
    data: Vec<Value>,
}

pub fn parse_weather_hours(body: &str) -> Result<Vec<Value>, ProviderError> {
    let response: WeatherPointResponse = parse_json(body, DataSource::Stormglass)?;
    Ok(response.hours)
}

pub fn parse_tide_extremes(body: &str) -> Result<Vec<Value>, ProviderError> {
    let response: TideExtremesResponse = parse_json(body, DataSource::Stormglass)?;
    Ok(response.data)
}

// ============================================================================
// HTTP client
// ============================================================================

pub struct StormglassClient {
    http: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    params: String,
    limiter: Option<Arc<RateLimiter>>,
}

impl StormglassClient {
    pub fn new(
        http: reqwest::blocking::Client,
        base_url: &str,
        api_key: &str,
        limiter: Option<Arc<RateLimiter>>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            params: join_params(STORMGLASS_WEATHER_PARAMS),
            limiter,
        }
    }

    fn get(
        &self,
        path: &str,
        day: &DayWindow,
        at: Coordinates,
        params: Option<&str>,
    ) -> Result<String, ProviderError> {
        let mut query = window_query(day, at);
        if let Some(params) = params {
            query.push(("params", params.to_string()));
        }

        let request = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .query(&query)
            .header("Authorization", self.api_key.as_str());

        send_for_text(request, DataSource::Stormglass, self.limiter.as_deref())
    }
}

/// Query parameters shared by both endpoints.
pub fn window_query(day: &DayWindow, at: Coordinates) -> Vec<(&'static str, String)> {
    vec![
        ("lat", at.latitude.to_string()),
        ("lng", at.longitude.to_string()),
        ("start", day.start_unix().to_string()),
        ("end", day.end_unix().to_string()),
    ]
}

impl MarineSource for StormglassClient {
    fn marine_weather(&self, day: &DayWindow, at: Coordinates) -> Result<Vec<Value>, ProviderError> {
        let body = self.get("/weather/point", day, at, Some(&self.params))?;
        parse_weather_hours(&body)
    }

    fn tide_extremes(&self, day: &DayWindow, at: Coordinates) -> Result<Vec<Value>, ProviderError> {
        let body = self.get("/tide/extremes/point", day, at, None)?;
        parse_tide_extremes(&body)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::test_server::{client, serve_once};
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn test_weather_hours_pass_through_unmodified() {
        let hour = json!({
            "time": "2021-07-04T00:00:00+00:00",
            "airTemperature": { "noaa": 26.1, "sg": 26.1 },
            "waveHeight": { "sg": 0.8 }
        });
        let body = json!({ "hours": [hour.clone()], "meta": { "cost": 1 } }).to_string();
        assert_eq!(parse_weather_hours(&body).unwrap(), vec![hour]);
    }

    #[test]
    fn test_tide_extremes_pass_through_unmodified() {
        let extremes = vec![
            json!({ "height": 0.61, "time": "2021-07-04T03:12:00+00:00", "type": "high" }),
            json!({ "height": -0.55, "time": "2021-07-04T09:30:00+00:00", "type": "low" }),
        ];
        let body = json!({ "data": extremes.clone(), "meta": { "station": {} } }).to_string();
        assert_eq!(parse_tide_extremes(&body).unwrap(), extremes);
    }

    #[test]
    fn test_missing_payload_key_is_parse_error() {
        let body = r#"{ "errors": { "key": "API key is invalid" } }"#;
        assert!(matches!(parse_weather_hours(body), Err(ProviderError::Parse { .. })));
        assert!(matches!(parse_tide_extremes(body), Err(ProviderError::Parse { .. })));
    }

    #[test]
    fn test_window_query_uses_unix_day_bounds() {
        let day = DayWindow::for_date(NaiveDate::from_ymd_opt(2021, 7, 4).unwrap());
        let query = window_query(&day, Coordinates { latitude: 29.02, longitude: -80.92 });
        assert_eq!(
            query,
            vec![
                ("lat", "29.02".to_string()),
                ("lng", "-80.92".to_string()),
                ("start", "1625356800".to_string()),
                ("end", "1625443199".to_string()),
            ]
        );
    }

    #[test]
    fn test_tide_request_carries_key_header_and_window() {
        let body = json!({ "data": [{ "type": "high" }] }).to_string();
        let (url, server) = serve_once("200 OK", &body);
        let client = StormglassClient::new(client(), &format!("{}/", url), "sgkey", None);
        let day = DayWindow::for_date(NaiveDate::from_ymd_opt(2021, 7, 4).unwrap());

        let extremes = client
            .tide_extremes(&day, Coordinates { latitude: 1.5, longitude: 2.5 })
            .unwrap();
        assert_eq!(extremes, vec![json!({ "type": "high" })]);

        let head = server.join().unwrap();
        assert!(
            head.starts_with(
                "GET /tide/extremes/point?lat=1.5&lng=2.5&start=1625356800&end=1625443199 HTTP/1.1"
            ),
            "{}",
            head
        );
        assert!(head.to_lowercase().contains("authorization: sgkey"), "{}", head);
    }

    #[test]
    fn test_weather_request_sends_marine_params() {
        let (url, server) = serve_once("200 OK", r#"{"hours":[]}"#);
        let client = StormglassClient::new(client(), &url, "sgkey", None);
        let day = DayWindow::for_date(NaiveDate::from_ymd_opt(2021, 7, 4).unwrap());

        let hours = client
            .marine_weather(&day, Coordinates { latitude: 1.5, longitude: 2.5 })
            .unwrap();
        assert!(hours.is_empty());

        let head = server.join().unwrap();
        let request_line = head.lines().next().unwrap_or_default();
        assert!(request_line.starts_with("GET /weather/point?"), "{}", request_line);
        assert!(request_line.contains("&params=airTemperature%2C"), "{}", request_line);
    }

    #[test]
    fn test_quota_exhausted_is_http_status() {
        let (url, server) = serve_once("402 Payment Required", r#"{"errors":{"key":"quota"}}"#);
        let client = StormglassClient::new(client(), &url, "sgkey", None);
        let day = DayWindow::for_date(NaiveDate::from_ymd_opt(2021, 7, 4).unwrap());

        assert!(matches!(
            client.marine_weather(&day, Coordinates { latitude: 0.0, longitude: 0.0 }),
            Err(ProviderError::HttpStatus { status: 402, .. })
        ));
        server.join().unwrap();
    }
}
