//! Environmental data for an incident day.
//!
//! Composes the weather source with the optional marine source. Each
//! sub-fetch fails independently: a failure is logged and nulls only its
//! own field, never the record.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::ingest::{MarineSource, WeatherSource};
use crate::logging::{self, DataSource};
use crate::model::{Coordinates, EnvironmentalSample};

// ---------------------------------------------------------------------------
// Day window
// ---------------------------------------------------------------------------

/// One calendar day, 00:00:00 through 23:59:59.
///
/// Bounds are naive; providers that take unix timestamps read them as UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub date: NaiveDate,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DayWindow {
    pub fn for_date(date: NaiveDate) -> Self {
        let start = date.and_time(NaiveTime::MIN);
        Self {
            date,
            start,
            end: start + Duration::seconds(86_399),
        }
    }

    pub fn start_unix(&self) -> i64 {
        self.start.and_utc().timestamp()
    }

    pub fn end_unix(&self) -> i64 {
        self.end.and_utc().timestamp()
    }
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

pub struct EnvironmentFetcher<'a> {
    weather: &'a dyn WeatherSource,
    marine: Option<&'a dyn MarineSource>,
}

impl<'a> EnvironmentFetcher<'a> {
    pub fn new(weather: &'a dyn WeatherSource, marine: Option<&'a dyn MarineSource>) -> Self {
        Self { weather, marine }
    }

    /// Fetches everything available for `date` at `at`.
    pub fn fetch(&self, case_id: &str, date: NaiveDate, at: Coordinates) -> EnvironmentalSample {
        let day = DayWindow::for_date(date);

        logging::debug(
            DataSource::OpenMeteo,
            Some(case_id),
            &format!("Fetching weather data for case number {}", case_id),
        );
        let weather = match self.weather.hourly_weather(day.date, at) {
            Ok(samples) => Some(samples),
            Err(e) => {
                logging::log_provider_failure(case_id, "hourly weather", &e);
                None
            }
        };

        let (marine_weather, tide) = match self.marine {
            None => (None, None),
            Some(marine) => {
                let hours = match marine.marine_weather(&day, at) {
                    Ok(hours) => Some(hours),
                    Err(e) => {
                        logging::log_provider_failure(case_id, "marine weather", &e);
                        None
                    }
                };
                let extremes = match marine.tide_extremes(&day, at) {
                    Ok(extremes) => Some(extremes),
                    Err(e) => {
                        logging::log_provider_failure(case_id, "tide extremes", &e);
                        None
                    }
                };
                (Some(hours), Some(extremes))
            }
        };

        EnvironmentalSample {
            weather,
            marine_weather,
            tide,
        }
    }
}
