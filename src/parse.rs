//! Record parsing: turns a raw incident row into a validated timestamp.
//!
//! The dataset has no dedicated date column. The date lives inside the
//! case number ("2021.07.04.a") and the time of day in a free-text field
//! ("14h30", "Around 14h30", "Afternoon"). Rows that don't yield both are
//! rejected here, before any network call is made.
//!
//! # Clock injection
//! The historical floor is passed in rather than read from configuration,
//! so the floor check is deterministic in tests.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{IncidentRecord, OUTPUT_DATETIME_FORMAT, Rejection};

static DATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{4}\.\d{2}\.\d{2}").expect("date pattern is valid"));

static TIME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{2}h\d{2}").expect("time pattern is valid"));

/// chrono format for "<date match> <time match>", e.g. "2021.07.04 14h30".
const COMBINED_FORMAT: &str = "%Y.%m.%d %Hh%M";

/// A row that passed validation, borrowing its fields from the source record.
///
/// Holding this value proves the required fields are present, so downstream
/// stages never re-check them.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidIncident<'r> {
    pub case_number: &'r str,
    pub country: &'r str,
    pub area: Option<&'r str>,
    pub location: &'r str,
    pub timestamp: NaiveDateTime,
}

/// Validates a row and extracts its timestamp.
///
/// Required fields are checked in order: case number, country, time,
/// location. Area is optional. `historical_floor`, when set, rejects
/// timestamps whose date falls before it.
pub fn parse_record(
    record: &IncidentRecord,
    historical_floor: Option<NaiveDate>,
) -> Result<ValidIncident<'_>, Rejection> {
    let case_number = required(&record.case_number, "case number")?;
    let country = required(&record.country, "country")?;
    let time = required(&record.time, "time")?;
    let location = required(&record.location, "location")?;

    let timestamp = parse_timestamp(case_number, time)?;

    if let Some(floor) = historical_floor {
        if timestamp.date() < floor {
            return Err(Rejection::BeforeHistoricalFloor {
                date: timestamp.date(),
                floor,
            });
        }
    }

    Ok(ValidIncident {
        case_number,
        country,
        area: record.area.as_deref().filter(|a| !a.trim().is_empty()),
        location,
        timestamp,
    })
}

/// Finds `YYYY.MM.DD` anywhere in the case number and `HHhMM` anywhere in
/// the time field, and parses the pair as a calendar date-time.
pub fn parse_timestamp(case_number: &str, time: &str) -> Result<NaiveDateTime, Rejection> {
    let date = DATE_PATTERN
        .find(case_number)
        .ok_or(Rejection::NoDatePattern)?;
    let time = TIME_PATTERN.find(time).ok_or(Rejection::NoTimePattern)?;

    let combined = format!("{} {}", date.as_str(), time.as_str());
    let timestamp = NaiveDateTime::parse_from_str(&combined, COMBINED_FORMAT).map_err(|e| {
        Rejection::InvalidDateTime {
            value: combined.clone(),
            reason: e.to_string(),
        }
    })?;

    // chrono accepts year 0 (1 BC); the calendar starts at year 1.
    if timestamp.year() < 1 {
        return Err(Rejection::InvalidDateTime {
            value: combined,
            reason: "year out of range".to_string(),
        });
    }
    Ok(timestamp)
}

/// Formats a timestamp for the output document.
pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(OUTPUT_DATETIME_FORMAT).to_string()
}

fn required<'r>(field: &'r Option<String>, name: &'static str) -> Result<&'r str, Rejection> {
    field
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .ok_or(Rejection::MissingField(name))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
