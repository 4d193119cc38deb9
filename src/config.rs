//! Configuration for a batch run.
//!
//! Two sources, resolved once at startup and passed by reference from then on:
//!
//! - Provider endpoints and API keys come from the environment (`.env` is
//!   loaded by the binary with `dotenv`). Variable names are taken from
//!   `providers::PROVIDER_REGISTRY`.
//! - Pipeline settings (paths, workers, pacing, parser floor, logging) come
//!   from built-in defaults, optionally overridden by a TOML file and then by
//!   command-line flags.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use crate::logging::{DataSource, LogLevel};
use crate::model::PipelineError;
use crate::providers::{self, Provider};

/// Output file name used when none is configured.
pub const DEFAULT_OUTPUT_PATH: &str = "shark_incidents.json";

// ---------------------------------------------------------------------------
// Pipeline settings
// ---------------------------------------------------------------------------

/// Tunables for one batch run. Every field has a default, so a settings file
/// only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSettings {
    /// Incident CSV to read.
    pub input_path: Option<PathBuf>,
    /// Where the JSON array of enriched records is written.
    pub output_path: PathBuf,
    /// Worker threads; 1 processes rows sequentially.
    pub workers: usize,
    /// Pause before each valid row's requests, in milliseconds.
    pub row_delay_ms: u64,
    /// Shared request budget across all workers; 0 disables the limiter.
    pub requests_per_second: f64,
    /// Reject incidents dated before `historical_floor`.
    pub enforce_historical_floor: bool,
    pub historical_floor: NaiveDate,
    /// Reuse coordinates for repeated addresses within a run.
    pub memoize_geocoding: bool,
    /// Per-request timeout for every provider.
    pub http_timeout_secs: u64,
    pub log_level: LogLevel,
    pub log_file: Option<String>,
    pub console_timestamps: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            input_path: None,
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            workers: 16,
            row_delay_ms: 1600, // Open-Meteo free tier: ~10 req/s across 16 workers
            requests_per_second: 10.0,
            enforce_historical_floor: true,
            historical_floor: providers::default_historical_floor(),
            memoize_geocoding: false,
            http_timeout_secs: 30,
            log_level: LogLevel::Info,
            log_file: None,
            console_timestamps: false,
        }
    }
}

impl PipelineSettings {
    /// Parses settings from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, PipelineError> {
        toml::from_str(text).map_err(|e| PipelineError::Config(format!("invalid settings: {}", e)))
    }

    /// Loads settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// The floor the parser should apply, if enforcement is on.
    pub fn historical_floor(&self) -> Option<NaiveDate> {
        self.enforce_historical_floor.then_some(self.historical_floor)
    }

    pub fn row_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.row_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// Provider endpoints
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub url: String,
    pub api_key: Option<String>,
}

/// Everything a batch run needs, built once in `main`.
#[derive(Debug, Clone)]
pub struct Config {
    pub geocoding: ServiceEndpoint,
    pub open_meteo: ServiceEndpoint,
    /// Present only when both Stormglass URL and key are set.
    pub stormglass: Option<ServiceEndpoint>,
    pub settings: PipelineSettings,
}

impl Config {
    /// Reads provider endpoints from the process environment.
    pub fn from_env(settings: PipelineSettings) -> Result<Self, PipelineError> {
        Self::from_lookup(settings, |key| std::env::var(key).ok())
    }

    /// Reads provider endpoints through `lookup`, which maps a variable name
    /// to its value. Blank values count as unset.
    pub fn from_lookup<F>(settings: PipelineSettings, lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let geocoding = required_endpoint(registry_entry(DataSource::Geocoding)?, &get)?;
        let open_meteo = required_endpoint(registry_entry(DataSource::OpenMeteo)?, &get)?;
        let stormglass = optional_endpoint(registry_entry(DataSource::Stormglass)?, &get)?;

        if settings.workers == 0 {
            return Err(PipelineError::Config("workers must be at least 1".to_string()));
        }

        Ok(Self {
            geocoding,
            open_meteo,
            stormglass,
            settings,
        })
    }
}

fn registry_entry(source: DataSource) -> Result<&'static Provider, PipelineError> {
    providers::find_provider(source)
        .ok_or_else(|| PipelineError::Config(format!("no registry entry for {}", source)))
}

fn required_endpoint(
    provider: &Provider,
    get: &dyn Fn(&str) -> Option<String>,
) -> Result<ServiceEndpoint, PipelineError> {
    let url = get(provider.url_env).ok_or_else(|| {
        PipelineError::Config(format!("{} is not set ({})", provider.url_env, provider.name))
    })?;
    let api_key = match provider.key_env {
        Some(key_env) => Some(get(key_env).ok_or_else(|| {
            PipelineError::Config(format!("{} is not set ({})", key_env, provider.name))
        })?),
        None => None,
    };
    Ok(ServiceEndpoint { url, api_key })
}

/// An optional provider is enabled only when its URL and key are both set;
/// setting just one of them is a configuration mistake.
fn optional_endpoint(
    provider: &Provider,
    get: &dyn Fn(&str) -> Option<String>,
) -> Result<Option<ServiceEndpoint>, PipelineError> {
    let url = get(provider.url_env);
    let api_key = provider.key_env.and_then(|key_env| get(key_env));

    match (url, api_key, provider.key_env) {
        (None, None, _) => Ok(None),
        (Some(url), None, None) => Ok(Some(ServiceEndpoint { url, api_key: None })),
        (Some(url), Some(key), _) => Ok(Some(ServiceEndpoint {
            url,
            api_key: Some(key),
        })),
        _ => Err(PipelineError::Config(format!(
            "{} needs both {} and {}",
            provider.name,
            provider.url_env,
            provider.key_env.unwrap_or("its API key"),
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const BASE: &[(&str, &str)] = &[
        ("GEOCODING_URL", "https://maps.example/geocode/json"),
        ("GEOCODING_API_KEY", "geo-key"),
        ("OPEN_METEO_URL", "https://archive-api.open-meteo.com/v1/archive"),
    ];

    #[test]
    fn test_required_endpoints_are_read() {
        let config = Config::from_lookup(PipelineSettings::default(), env(BASE)).unwrap();
        assert_eq!(config.geocoding.url, "https://maps.example/geocode/json");
        assert_eq!(config.geocoding.api_key.as_deref(), Some("geo-key"));
        assert_eq!(config.open_meteo.api_key, None);
        assert_eq!(config.stormglass, None);
    }

    #[test]
    fn test_missing_geocoding_key_is_an_error() {
        let result = Config::from_lookup(
            PipelineSettings::default(),
            env(&[
                ("GEOCODING_URL", "https://maps.example/geocode/json"),
                ("GEOCODING_API_KEY", "   "),
                ("OPEN_METEO_URL", "https://archive-api.open-meteo.com/v1/archive"),
            ]),
        );
        match result {
            Err(PipelineError::Config(msg)) => assert!(msg.contains("GEOCODING_API_KEY"), "{}", msg),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_weather_url_is_an_error() {
        let result = Config::from_lookup(
            PipelineSettings::default(),
            env(&[("GEOCODING_URL", "u"), ("GEOCODING_API_KEY", "k")]),
        );
        assert!(matches!(result, Err(PipelineError::Config(msg)) if msg.contains("OPEN_METEO_URL")));
    }

    #[test]
    fn test_stormglass_enabled_with_url_and_key() {
        let mut pairs = BASE.to_vec();
        pairs.push(("STORMGLASS_URL", "https://api.stormglass.io/v2"));
        pairs.push(("STORMGLASS_API_KEY", "sg-key"));
        let config = Config::from_lookup(PipelineSettings::default(), env(&pairs)).unwrap();
        assert_eq!(
            config.stormglass,
            Some(ServiceEndpoint {
                url: "https://api.stormglass.io/v2".to_string(),
                api_key: Some("sg-key".to_string()),
            })
        );
    }

    #[test]
    fn test_stormglass_url_without_key_is_an_error() {
        let mut pairs = BASE.to_vec();
        pairs.push(("STORMGLASS_URL", "https://api.stormglass.io/v2"));
        let result = Config::from_lookup(PipelineSettings::default(), env(&pairs));
        assert!(matches!(result, Err(PipelineError::Config(msg)) if msg.contains("STORMGLASS_API_KEY")));
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        let settings = PipelineSettings { workers: 0, ..Default::default() };
        assert!(Config::from_lookup(settings, env(BASE)).is_err());
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let settings = PipelineSettings::default();
        assert_eq!(settings.output_path, PathBuf::from("shark_incidents.json"));
        assert_eq!(settings.workers, 16);
        assert_eq!(settings.row_delay_ms, 1600);
        assert_eq!(settings.historical_floor(), NaiveDate::from_ymd_opt(1941, 1, 1));
        assert!(!settings.memoize_geocoding);
    }

    #[test]
    fn test_partial_toml_overrides_only_named_fields() {
        let settings = PipelineSettings::from_toml_str(
            r#"
            input_path = "data/GSAF5.csv"
            workers = 4
            row_delay_ms = 0
            enforce_historical_floor = false
            log_level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(settings.input_path, Some(PathBuf::from("data/GSAF5.csv")));
        assert_eq!(settings.workers, 4);
        assert_eq!(settings.row_delay_ms, 0);
        assert_eq!(settings.historical_floor(), None);
        assert_eq!(settings.log_level, LogLevel::Debug);
        assert_eq!(settings.http_timeout_secs, 30);
    }

    #[test]
    fn test_custom_floor_parses_from_toml() {
        let settings = PipelineSettings::from_toml_str(r#"historical_floor = "1950-01-01""#).unwrap();
        assert_eq!(settings.historical_floor(), NaiveDate::from_ymd_opt(1950, 1, 1));
    }

    #[test]
    fn test_unknown_setting_is_rejected() {
        let result = PipelineSettings::from_toml_str("worker_count = 3");
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }
}
