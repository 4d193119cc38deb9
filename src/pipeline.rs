//! Batch orchestration: parse → geocode → fetch for every incident row.
//!
//! Rows are independent. A row either becomes one `EnrichedRecord` or is
//! dropped with a logged reason; nothing a single row does can abort the
//! batch. Only reading the input and writing the output are fatal.
//!
//! Rows run sequentially (`workers = 1`) or on a fixed pool of scoped
//! threads pulling row indices from a shared cursor. Either way the output
//! keeps input order, so identical input and provider responses produce
//! identical output bytes.

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use crate::config::PipelineSettings;
use crate::environment::EnvironmentFetcher;
use crate::ingest::geocoding::build_address;
use crate::ingest::{Geocoder, MarineSource, WeatherSource};
use crate::logging::{self, DataSource};
use crate::model::{EnrichedRecord, IncidentRecord, PipelineError, ProviderError, Rejection};
use crate::parse::{format_timestamp, parse_record};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What happened to one input row.
#[derive(Debug)]
pub enum RowOutcome {
    Enriched(EnrichedRecord),
    /// Failed validation; no request was made.
    Rejected(Rejection),
    /// Geocoding failed, so there is no position to fetch data for.
    GeocodingFailed(ProviderError),
}

/// Counts for a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub valid: usize,
    pub rejected: usize,
    pub geocoding_failures: usize,
    /// Emitted records whose weather fetch failed.
    pub missing_weather: usize,
}

impl BatchSummary {
    pub fn invalid(&self) -> usize {
        self.total - self.valid
    }

    /// The three lines printed at the end of a run.
    pub fn lines(&self) -> [String; 3] {
        [
            format!("{} total events", self.total),
            format!("{} valid events", self.valid),
            format!("{} invalid events", self.invalid()),
        ]
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lines().join("\n"))
    }
}

#[derive(Debug)]
pub struct BatchResult {
    /// Enriched records in input order.
    pub records: Vec<EnrichedRecord>,
    pub summary: BatchSummary,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The provider clients a batch talks to.
#[derive(Clone, Copy)]
pub struct Providers<'a> {
    pub geocoder: &'a dyn Geocoder,
    pub weather: &'a dyn WeatherSource,
    pub marine: Option<&'a dyn MarineSource>,
}

pub struct Pipeline<'a> {
    providers: Providers<'a>,
    settings: &'a PipelineSettings,
}

impl<'a> Pipeline<'a> {
    pub fn new(providers: Providers<'a>, settings: &'a PipelineSettings) -> Self {
        Self {
            providers,
            settings,
        }
    }

    /// Runs every row and aggregates the results.
    pub fn run(&self, rows: &[IncidentRecord]) -> BatchResult {
        let workers = self.settings.workers.clamp(1, rows.len().max(1));
        logging::info(
            DataSource::System,
            None,
            &format!("Processing {} incidents with {} worker(s)", rows.len(), workers),
        );

        let outcomes = if workers == 1 {
            rows.iter().map(|row| self.process_row(row)).collect()
        } else {
            self.run_parallel(rows, workers)
        };

        let mut summary = BatchSummary {
            total: rows.len(),
            ..Default::default()
        };
        let mut records = Vec::new();
        for outcome in outcomes {
            match outcome {
                RowOutcome::Enriched(record) => {
                    summary.valid += 1;
                    if record.environment.weather.is_none() {
                        summary.missing_weather += 1;
                    }
                    records.push(record);
                }
                RowOutcome::Rejected(_) => summary.rejected += 1,
                RowOutcome::GeocodingFailed(_) => summary.geocoding_failures += 1,
            }
        }

        logging::log_batch_summary(
            summary.total,
            summary.valid,
            summary.invalid(),
            summary.missing_weather,
        );
        BatchResult { records, summary }
    }

    /// Workers claim rows from a shared cursor; results are re-sorted by row
    /// index so output order matches input order.
    fn run_parallel(&self, rows: &[IncidentRecord], workers: usize) -> Vec<RowOutcome> {
        let cursor = &AtomicUsize::new(0);

        let mut indexed: Vec<(usize, RowOutcome)> = thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(move || {
                        let mut done = Vec::new();
                        loop {
                            let index = cursor.fetch_add(1, Ordering::Relaxed);
                            let Some(row) = rows.get(index) else { break };
                            done.push((index, self.process_row(row)));
                        }
                        done
                    })
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
                })
                .collect()
        });

        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, outcome)| outcome).collect()
    }

    /// Parse, geocode and fetch for one row.
    pub fn process_row(&self, row: &IncidentRecord) -> RowOutcome {
        let case_id = row.case_number.as_deref().unwrap_or("<no case number>");

        let incident = match parse_record(row, self.settings.historical_floor()) {
            Ok(incident) => incident,
            Err(rejection) => {
                logging::log_rejection(case_id, &rejection);
                return RowOutcome::Rejected(rejection);
            }
        };

        let delay = self.settings.row_delay();
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let address = build_address(Some(incident.location), incident.area, Some(incident.country));
        logging::debug(
            DataSource::Geocoding,
            Some(case_id),
            &format!("Fetching coordinates for '{}'", address),
        );
        let coordinates = match self.providers.geocoder.geocode(&address) {
            Ok(coordinates) => coordinates,
            Err(e) => {
                logging::log_provider_failure(case_id, "geocoding", &e);
                return RowOutcome::GeocodingFailed(e);
            }
        };
        logging::debug(
            DataSource::Geocoding,
            Some(case_id),
            &format!(
                "Got coordinates. Lat: {}, Long: {}",
                coordinates.latitude, coordinates.longitude
            ),
        );

        let environment = EnvironmentFetcher::new(self.providers.weather, self.providers.marine)
            .fetch(case_id, incident.timestamp.date(), coordinates);

        RowOutcome::Enriched(EnrichedRecord {
            case_number: incident.case_number.to_string(),
            country: incident.country.to_string(),
            area: incident.area.map(str::to_string),
            location: incident.location.to_string(),
            datetime: format_timestamp(&incident.timestamp),
            coordinates,
            environment,
        })
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Serializes records as an indented JSON array.
///
/// Fails if any record holds a non-finite number, which JSON cannot
/// represent.
pub fn render_output(records: &[EnrichedRecord]) -> Result<Vec<u8>, PipelineError> {
    for record in records {
        if let Some(field) = record.first_non_finite_field() {
            return Err(PipelineError::NonFiniteValue {
                case_number: record.case_number.clone(),
                field,
            });
        }
    }

    let mut bytes = serde_json::to_vec_pretty(records)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Writes the output document. Nothing is written if rendering fails.
pub fn write_output(path: &Path, records: &[EnrichedRecord]) -> Result<(), PipelineError> {
    let bytes = render_output(records)?;
    fs::write(path, bytes).map_err(|source| PipelineError::Io {
        path: path.display().to_string(),
        source,
    })?;

    logging::info(
        DataSource::Output,
        None,
        &format!("Wrote {} records to {}", records.len(), path.display()),
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
