//! Provider registry for the enrichment service.
//!
//! Defines the external services this crate talks to, along with the
//! environment keys that configure them, the parameter sets we request,
//! and any historical-data floor. This is the single source of truth for
//! provider metadata: configuration, clients and verification all read it
//! from here rather than hardcoding names.

use chrono::NaiveDate;

use crate::logging::DataSource;

// ---------------------------------------------------------------------------
// Parameter sets
// ---------------------------------------------------------------------------

/// Hourly fields requested from Open-Meteo. The response carries one
/// parallel array per field, plus `time`.
pub const OPEN_METEO_HOURLY_PARAMS: &[&str] = &[
    "temperature_2m",
    "apparent_temperature",
    "precipitation",
    "rain",
];

/// Marine weather fields requested from Stormglass `/weather/point`.
pub const STORMGLASS_WEATHER_PARAMS: &[&str] = &[
    "airTemperature",
    "precipitation",
    "seaLevel",
    "pressure",
    "waterTemperature",
    "waveHeight",
    "wavePeriod",
    "windSpeed",
];

// ---------------------------------------------------------------------------
// Provider metadata
// ---------------------------------------------------------------------------

/// Metadata for one external provider.
pub struct Provider {
    /// Log/error tag for this provider.
    pub source: DataSource,
    /// Human-readable name.
    pub name: &'static str,
    /// What we use the provider for.
    pub description: &'static str,
    /// Environment variable holding the base URL.
    pub url_env: &'static str,
    /// Environment variable holding the API key, if the provider needs one.
    pub key_env: Option<&'static str>,
    /// Whether the batch can run without this provider.
    pub required: bool,
    /// Parameters requested by default.
    pub default_params: &'static [&'static str],
    /// Earliest date with data, as (year, month, day).
    pub historical_floor: Option<(i32, u32, u32)>,
}

impl Provider {
    pub fn historical_floor_date(&self) -> Option<NaiveDate> {
        self.historical_floor
            .and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
    }
}

/// All providers used for enrichment, in pipeline order.
pub static PROVIDER_REGISTRY: &[Provider] = &[
    Provider {
        source: DataSource::Geocoding,
        name: "Geocoding API",
        description: "Resolves 'location, area, country' to a latitude/longitude. \
                      Always takes the first candidate.",
        url_env: "GEOCODING_URL",
        key_env: Some("GEOCODING_API_KEY"),
        required: true,
        default_params: &[],
        historical_floor: None,
    },
    Provider {
        source: DataSource::OpenMeteo,
        name: "Open-Meteo Historical Weather",
        description: "Hourly reanalysis weather for the incident day. \
                      Free tier allows roughly 10 requests per second.",
        url_env: "OPEN_METEO_URL",
        key_env: None,
        required: true,
        default_params: OPEN_METEO_HOURLY_PARAMS,
        historical_floor: Some((1941, 1, 1)),
    },
    Provider {
        source: DataSource::Stormglass,
        name: "Stormglass",
        description: "Marine weather hours and tide extremes for the incident day. \
                      Optional; enabled when both URL and key are set.",
        url_env: "STORMGLASS_URL",
        key_env: Some("STORMGLASS_API_KEY"),
        required: false,
        default_params: STORMGLASS_WEATHER_PARAMS,
        historical_floor: None,
    },
];

/// Looks up a provider by its source tag.
pub fn find_provider(source: DataSource) -> Option<&'static Provider> {
    PROVIDER_REGISTRY.iter().find(|p| p.source == source)
}

/// The floor applied by the record parser: the latest floor among required
/// providers, or 1941-01-01 if the registry defines none.
pub fn default_historical_floor() -> NaiveDate {
    PROVIDER_REGISTRY
        .iter()
        .filter(|p| p.required)
        .filter_map(Provider::historical_floor_date)
        .max()
        .or_else(|| NaiveDate::from_ymd_opt(1941, 1, 1))
        .unwrap_or_default()
}

/// Joins a parameter set the way every provider expects it: comma-separated.
pub fn join_params(params: &[&str]) -> String {
    params.join(",")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
