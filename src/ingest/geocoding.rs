//! Geocoding API client
//!
//! Resolves an incident's "location, area, country" to coordinates with a
//! single GET request carrying the query parameters `key` and `address`.
//! The response follows the Google Geocoding shape:
//! `results[0].geometry.location.{lat,lng}`.
//!
//! Ambiguous addresses are not disambiguated: the first candidate wins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;

use super::{Geocoder, parse_json, send_for_text};
use crate::logging::{self, DataSource};
use crate::model::{Coordinates, ProviderError};
use crate::rate_limit::RateLimiter;

// ============================================================================
// API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
    /// "OK", "ZERO_RESULTS", "REQUEST_DENIED", ... (absent on some proxies)
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

// ============================================================================
// Address composition
// ============================================================================

/// Joins the non-empty address parts, most specific first:
/// "location, area, country".
pub fn build_address(location: Option<&str>, area: Option<&str>, country: Option<&str>) -> String {
    [location, area, country]
        .into_iter()
        .flatten()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// Response parsing
// ============================================================================

/// Extracts the first result's position from a geocoding response body.
pub fn parse_geocoding_response(address: &str, body: &str) -> Result<Coordinates, ProviderError> {
    let response: GeocodeResponse = parse_json(body, DataSource::Geocoding)?;

    match response.results.into_iter().next() {
        Some(first) => Ok(Coordinates {
            latitude: first.geometry.location.lat,
            longitude: first.geometry.location.lng,
        }),
        None => match response.status.as_deref() {
            None | Some("OK") | Some("ZERO_RESULTS") => Err(ProviderError::NoResults {
                provider: DataSource::Geocoding,
                query: address.to_string(),
            }),
            // 200 responses can still carry a denial or quota status.
            Some(status) => Err(ProviderError::Parse {
                provider: DataSource::Geocoding,
                message: format!("status {} with no results", status),
            }),
        },
    }
}

// ============================================================================
// HTTP client
// ============================================================================

pub struct GeocodingClient {
    http: reqwest::blocking::Client,
    url: String,
    api_key: String,
    limiter: Option<Arc<RateLimiter>>,
}

impl GeocodingClient {
    pub fn new(
        http: reqwest::blocking::Client,
        url: &str,
        api_key: &str,
        limiter: Option<Arc<RateLimiter>>,
    ) -> Self {
        Self {
            http,
            url: url.to_string(),
            api_key: api_key.to_string(),
            limiter,
        }
    }
}

/// Query parameters for one lookup.
pub fn geocoding_query<'a>(api_key: &'a str, address: &'a str) -> [(&'static str, &'a str); 2] {
    [("key", api_key), ("address", address)]
}

impl Geocoder for GeocodingClient {
    fn geocode(&self, address: &str) -> Result<Coordinates, ProviderError> {
        let request = self
            .http
            .get(&self.url)
            .query(&geocoding_query(&self.api_key, address));

        let body = send_for_text(request, DataSource::Geocoding, self.limiter.as_deref())?;
        parse_geocoding_response(address, &body)
    }
}

// ============================================================================
// Memoization
// ============================================================================

/// Caches successful lookups by composed address.
///
/// The incident dataset repeats popular beaches many times, so this cuts
/// geocoding traffic without changing output. Failures are not cached, so
/// every row with a failing address is attempted and logged on its own.
pub struct MemoizedGeocoder<G> {
    inner: G,
    cache: Mutex<HashMap<String, Coordinates>>,
}

impl<G: Geocoder> MemoizedGeocoder<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn cached_addresses(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl<G: Geocoder> Geocoder for MemoizedGeocoder<G> {
    fn geocode(&self, address: &str) -> Result<Coordinates, ProviderError> {
        let cached = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address)
            .copied();
        if let Some(coordinates) = cached {
            logging::debug(
                DataSource::Geocoding,
                None,
                &format!("Cache hit for '{}'", address),
            );
            return Ok(coordinates);
        }

        // Lock released during the request; two workers may race on the same
        // address and both fetch, which only costs a duplicate call.
        let coordinates = self.inner.geocode(address)?;
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(address.to_string(), coordinates);
        Ok(coordinates)
    }
}

// ============================================================================
// Tests
// ============================================================================
