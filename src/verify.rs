//! Provider Verification Module
//!
//! Sends one probe request through each configured provider client to find
//! out which are reachable and returning data before committing to a long
//! batch run (expired keys and exhausted quotas otherwise show up as
//! thousands of per-row failures).

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::environment::DayWindow;
use crate::ingest::{Geocoder, MarineSource, WeatherSource};
use crate::logging::DataSource;
use crate::model::{Coordinates, ProviderError};
use crate::pipeline::Providers;
use crate::providers;

/// A well-known address every geocoder should resolve.
pub const PROBE_ADDRESS: &str = "Bondi Beach, New South Wales, AUSTRALIA";

/// Used for the weather probes when the geocoding probe fails.
pub const PROBE_FALLBACK: Coordinates = Coordinates {
    latitude: -33.8915,
    longitude: 151.2767,
};

/// A date well inside every provider's archive.
pub fn probe_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 7, 4).unwrap_or_default()
}

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub timestamp: String,
    pub results: Vec<ProviderVerification>,
    pub summary: VerificationSummary,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerificationSummary {
    pub total: usize,
    pub working: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderVerification {
    /// Registry name of the provider behind this check.
    pub provider: String,
    pub check: String,
    pub status: VerificationStatus,
    pub sample_data_count: usize,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum VerificationStatus {
    Success,
    /// Responded, but with no data for the probe.
    PartialSuccess,
    Failed,
}

impl ProviderVerification {
    fn from_result<T>(
        source: DataSource,
        check: &str,
        result: &Result<T, ProviderError>,
        count: impl Fn(&T) -> usize,
    ) -> Self {
        let provider = providers::find_provider(source)
            .map(|p| p.name.to_string())
            .unwrap_or_else(|| source.to_string());
        match result {
            Ok(data) => {
                let sample_data_count = count(data);
                Self {
                    provider,
                    check: check.to_string(),
                    status: if sample_data_count > 0 {
                        VerificationStatus::Success
                    } else {
                        VerificationStatus::PartialSuccess
                    },
                    sample_data_count,
                    error_message: None,
                }
            }
            Err(e @ ProviderError::NoResults { .. }) => Self {
                provider,
                check: check.to_string(),
                status: VerificationStatus::PartialSuccess,
                sample_data_count: 0,
                error_message: Some(e.to_string()),
            },
            Err(e) => Self {
                provider,
                check: check.to_string(),
                status: VerificationStatus::Failed,
                sample_data_count: 0,
                error_message: Some(e.to_string()),
            },
        }
    }
}

// ============================================================================
// Individual checks
// ============================================================================

/// Returns the verification and the probe position for the weather checks.
pub fn verify_geocoder(geocoder: &dyn Geocoder) -> (ProviderVerification, Coordinates) {
    let result = geocoder.geocode(PROBE_ADDRESS);
    let verification = ProviderVerification::from_result(DataSource::Geocoding, "geocoding", &result, |_| 1);
    (verification, result.unwrap_or(PROBE_FALLBACK))
}

pub fn verify_weather(
    weather: &dyn WeatherSource,
    date: NaiveDate,
    at: Coordinates,
) -> ProviderVerification {
    let result = weather.hourly_weather(date, at);
    ProviderVerification::from_result(DataSource::OpenMeteo, "hourly weather", &result, Vec::len)
}

pub fn verify_marine(
    marine: &dyn MarineSource,
    date: NaiveDate,
    at: Coordinates,
) -> Vec<ProviderVerification> {
    let day = DayWindow::for_date(date);
    vec![
        ProviderVerification::from_result(
            DataSource::Stormglass,
            "marine weather",
            &marine.marine_weather(&day, at),
            Vec::len,
        ),
        ProviderVerification::from_result(
            DataSource::Stormglass,
            "tide extremes",
            &marine.tide_extremes(&day, at),
            Vec::len,
        ),
    ]
}

// ============================================================================
// Full run
// ============================================================================

/// Probes every configured provider for `probe_date`.
pub fn verify_providers(providers: &Providers<'_>, probe_date: NaiveDate) -> VerificationReport {
    let mut results = Vec::new();

    let (geocoding, at) = verify_geocoder(providers.geocoder);
    results.push(geocoding);
    results.push(verify_weather(providers.weather, probe_date, at));
    if let Some(marine) = providers.marine {
        results.extend(verify_marine(marine, probe_date, at));
    }

    let mut summary = VerificationSummary {
        total: results.len(),
        ..Default::default()
    };
    for result in &results {
        match result.status {
            VerificationStatus::Success | VerificationStatus::PartialSuccess => summary.working += 1,
            VerificationStatus::Failed => summary.failed += 1,
        }
    }

    VerificationReport {
        timestamp: Utc::now().to_rfc3339(),
        results,
        summary,
    }
}

/// "name: description" for a provider named in the registry.
pub fn provider_heading(name: &str) -> Option<String> {
    providers::PROVIDER_REGISTRY
        .iter()
        .find(|p| p.name == name)
        .map(|p| format!("{}: {}", p.name, p.description))
}

pub fn print_summary(report: &VerificationReport) {
    println!("\n═══════════════════════════════════════════════════════════");
    println!("📊 PROVIDER VERIFICATION");
    println!("═══════════════════════════════════════════════════════════");
    let mut current: Option<&str> = None;
    for result in &report.results {
        if current != Some(result.provider.as_str()) {
            current = Some(result.provider.as_str());
            println!(
                "\n{}",
                provider_heading(&result.provider).unwrap_or_else(|| result.provider.clone())
            );
        }
        match result.status {
            VerificationStatus::Success => {
                println!("  {:<16} ✓ OK ({} entries)", result.check, result.sample_data_count)
            }
            VerificationStatus::PartialSuccess => {
                println!("  {:<16} ⚠ Responsive but no data", result.check)
            }
            VerificationStatus::Failed => println!(
                "  {:<16} ✗ FAILED: {}",
                result.check,
                result.error_message.as_deref().unwrap_or("Unknown")
            ),
        }
    }
    println!();
    println!(
        "Providers: {}/{} working ({} failed)",
        report.summary.working, report.summary.total, report.summary.failed
    );
    println!("═══════════════════════════════════════════════════════════");
}
