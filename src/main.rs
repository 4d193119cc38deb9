//! shark_enrich: enrich shark-incident records with coordinates and weather.
//!
//! Reads the incident CSV, resolves each valid row's location, fetches
//! environmental data for the incident day and writes one JSON array.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use shark_enrich::config::{Config, PipelineSettings};
use shark_enrich::ingest::Geocoder;
use shark_enrich::ingest::geocoding::{GeocodingClient, MemoizedGeocoder};
use shark_enrich::ingest::incidents::read_incidents;
use shark_enrich::ingest::open_meteo::OpenMeteoClient;
use shark_enrich::ingest::stormglass::StormglassClient;
use shark_enrich::ingest::MarineSource;
use shark_enrich::logging::{self, DataSource, LogLevel};
use shark_enrich::model::PipelineError;
use shark_enrich::pipeline::{Pipeline, Providers, write_output};
use shark_enrich::rate_limit::RateLimiter;
use shark_enrich::verify;

#[derive(Parser)]
#[command(name = "shark_enrich")]
#[command(about = "Enrich shark incident records with location and environmental data")]
#[command(version)]
struct Cli {
    /// Incident CSV to read
    #[arg(long)]
    input: Option<PathBuf>,

    /// Output JSON file
    #[arg(long)]
    output: Option<PathBuf>,

    /// TOML settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Worker threads
    #[arg(long)]
    workers: Option<usize>,

    /// Process rows one at a time (same as --workers 1)
    #[arg(long, conflicts_with = "workers")]
    sequential: bool,

    /// Pause before each valid row's requests, in milliseconds
    #[arg(long)]
    row_delay_ms: Option<u64>,

    /// Accept incidents dated before the weather archive begins
    #[arg(long)]
    no_historical_floor: bool,

    /// Reuse coordinates for repeated addresses
    #[arg(long)]
    memoize_geocoding: bool,

    /// Append log entries to this file
    #[arg(long)]
    log_file: Option<String>,

    /// Log per-row debug detail
    #[arg(long, short)]
    verbose: bool,

    /// Probe the configured providers and exit
    #[arg(long)]
    verify: bool,
}

impl Cli {
    /// Applies command-line overrides on top of file/default settings.
    fn apply(&self, settings: &mut PipelineSettings) {
        if let Some(input) = &self.input {
            settings.input_path = Some(input.clone());
        }
        if let Some(output) = &self.output {
            settings.output_path = output.clone();
        }
        if let Some(workers) = self.workers {
            settings.workers = workers;
        }
        if self.sequential {
            settings.workers = 1;
        }
        if let Some(delay) = self.row_delay_ms {
            settings.row_delay_ms = delay;
        }
        if self.no_historical_floor {
            settings.enforce_historical_floor = false;
        }
        if self.memoize_geocoding {
            settings.memoize_geocoding = true;
        }
        if let Some(log_file) = &self.log_file {
            settings.log_file = Some(log_file.clone());
        }
        if self.verbose {
            settings.log_level = LogLevel::Debug;
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => PipelineSettings::load(path)?,
        None => PipelineSettings::default(),
    };
    cli.apply(&mut settings);

    logging::init_logger(
        settings.log_level,
        settings.log_file.as_deref(),
        settings.console_timestamps,
    );

    let config = Config::from_env(settings)?;
    let settings = &config.settings;

    let http = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(settings.http_timeout_secs))
        .build()
        .map_err(PipelineError::HttpClient)?;
    let limiter = RateLimiter::per_second(settings.requests_per_second).map(Arc::new);
    match &limiter {
        Some(limiter) => logging::info(
            DataSource::System,
            None,
            &format!("Provider requests spaced {:?} apart", limiter.min_interval()),
        ),
        None => logging::info(DataSource::System, None, "Provider rate limit disabled"),
    }

    // Both are checked by Config::from_lookup; a missing key here is a bug.
    let geocoding_key = config.geocoding.api_key.as_deref().unwrap_or_default();
    let geocoding = GeocodingClient::new(
        http.clone(),
        &config.geocoding.url,
        geocoding_key,
        limiter.clone(),
    );
    let memoized = settings
        .memoize_geocoding
        .then(|| MemoizedGeocoder::new(&geocoding));
    let geocoder: &dyn Geocoder = match &memoized {
        Some(memoized) => memoized,
        None => &geocoding,
    };
    let weather = OpenMeteoClient::new(http.clone(), &config.open_meteo.url, limiter.clone());
    let marine = config.stormglass.as_ref().map(|endpoint| {
        StormglassClient::new(
            http.clone(),
            &endpoint.url,
            endpoint.api_key.as_deref().unwrap_or_default(),
            limiter.clone(),
        )
    });

    let providers = Providers {
        geocoder,
        weather: &weather,
        marine: marine.as_ref().map(|m| m as &dyn MarineSource),
    };

    if marine.is_none() {
        logging::info(
            DataSource::System,
            None,
            "Stormglass not configured; marine weather and tides are skipped",
        );
    }

    if cli.verify {
        let report = verify::verify_providers(&providers, verify::probe_date());
        verify::print_summary(&report);
        return Ok(());
    }

    let input = settings.input_path.as_deref().ok_or_else(|| {
        PipelineError::Config("no input file: pass --input or set input_path".to_string())
    })?;
    let rows = read_incidents(input)?;

    let result = Pipeline::new(providers, settings).run(&rows);
    for line in result.summary.lines() {
        println!("{}", line);
    }

    if let Some(memoized) = &memoized {
        logging::info(
            DataSource::Geocoding,
            None,
            &format!("Geocoding cache held {} distinct addresses", memoized.cached_addresses()),
        );
    }

    write_output(&settings.output_path, &result.records)?;
    Ok(())
}
