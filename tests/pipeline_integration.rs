//! Pipeline Integration Tests
//!
//! Drive a whole batch through the public API: CSV file on disk → parse →
//! geocode → fetch → JSON file on disk. Providers are in-process fakes, so
//! these run offline and deterministically.

use std::io::Write;
use std::sync::Mutex;

use chrono::NaiveDate;
use serde_json::{Value, json};
use tempfile::{NamedTempFile, TempDir};

use shark_enrich::config::PipelineSettings;
use shark_enrich::environment::DayWindow;
use shark_enrich::ingest::geocoding::MemoizedGeocoder;
use shark_enrich::ingest::incidents::read_incidents;
use shark_enrich::ingest::{Geocoder, MarineSource, WeatherSource};
use shark_enrich::logging::DataSource;
use shark_enrich::model::{Coordinates, HourlySample, ProviderError};
use shark_enrich::pipeline::{Pipeline, Providers, write_output};

const HEADER: &str = "Case Number,Date,Year,Type,Country,Area,Location,Activity,Time\n";

/// Answers every address with the same point, remembering what it was asked.
struct StubGeocoder {
    asked: Mutex<Vec<String>>,
}

impl StubGeocoder {
    fn new() -> Self {
        Self { asked: Mutex::new(Vec::new()) }
    }
}

impl Geocoder for StubGeocoder {
    fn geocode(&self, address: &str) -> Result<Coordinates, ProviderError> {
        self.asked.lock().unwrap().push(address.to_string());
        if address.starts_with("Nowhere") {
            return Err(ProviderError::NoResults {
                provider: DataSource::Geocoding,
                query: address.to_string(),
            });
        }
        Ok(Coordinates { latitude: 10.0, longitude: 20.0 })
    }
}

/// 24 hours for the requested day; values depend only on the inputs.
struct StubWeather;

impl WeatherSource for StubWeather {
    fn hourly_weather(
        &self,
        date: NaiveDate,
        at: Coordinates,
    ) -> Result<Vec<HourlySample>, ProviderError> {
        Ok((0..24)
            .map(|h| HourlySample {
                time: format!("{}T{:02}:00", date, h),
                temperature_2m: Some(at.latitude + h as f64 / 2.0),
                apparent_temperature: Some(at.longitude),
                precipitation: Some(0.0),
                rain: Some(0.0),
            })
            .collect())
    }
}

struct StubMarine;

impl MarineSource for StubMarine {
    fn marine_weather(&self, day: &DayWindow, _at: Coordinates) -> Result<Vec<Value>, ProviderError> {
        Ok(vec![json!({ "time": day.start_unix(), "waterTemperature": { "sg": 24.5 } })])
    }

    fn tide_extremes(&self, day: &DayWindow, _at: Coordinates) -> Result<Vec<Value>, ProviderError> {
        Ok(vec![
            json!({ "height": 0.8, "time": day.start_unix() + 3600, "type": "high" }),
            json!({ "height": -0.6, "time": day.end_unix() - 3600, "type": "low" }),
        ])
    }
}

fn write_csv(rows: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(HEADER.as_bytes()).unwrap();
    for row in rows {
        writeln!(file, "{}", row).unwrap();
    }
    file.flush().unwrap();
    file
}

fn quiet_settings(workers: usize) -> PipelineSettings {
    PipelineSettings {
        workers,
        row_delay_ms: 0,
        ..Default::default()
    }
}

#[test]
fn test_three_row_batch_keeps_only_the_valid_row() {
    let csv = write_csv(&[
        "2021.07.04.a,04-Jul-2021,2021,Unprovoked,USA,Florida,New Smyrna Beach,Surfing,14h30",
        "2021.07.05,05-Jul-2021,2021,Unprovoked,USA,Florida,,Swimming,10h00",
        "2021.07.06,06-Jul-2021,2021,Unprovoked,USA,Florida,Cocoa Beach,Wading,Afternoon",
    ]);
    let out_dir = TempDir::new().unwrap();
    let out_path = out_dir.path().join("incidents.json");

    let rows = read_incidents(csv.path()).unwrap();
    assert_eq!(rows.len(), 3);

    let geocoder = StubGeocoder::new();
    let settings = quiet_settings(1);
    let providers = Providers { geocoder: &geocoder, weather: &StubWeather, marine: None };
    let result = Pipeline::new(providers, &settings).run(&rows);

    assert_eq!(
        result.summary.lines(),
        [
            "3 total events".to_string(),
            "1 valid events".to_string(),
            "2 invalid events".to_string(),
        ]
    );
    assert_eq!(
        geocoder.asked.lock().unwrap().as_slice(),
        ["New Smyrna Beach, Florida, USA"]
    );

    write_output(&out_path, &result.records).unwrap();
    let written: Value = serde_json::from_str(&std::fs::read_to_string(&out_path).unwrap()).unwrap();
    let records = written.as_array().unwrap();
    assert_eq!(records.len(), 1);

    let record = &records[0];
    assert_eq!(record["case_number"], "2021.07.04.a");
    assert_eq!(record["country"], "USA");
    assert_eq!(record["area"], "Florida");
    assert_eq!(record["location"], "New Smyrna Beach");
    assert_eq!(record["datetime"], "2021-07-04T14:30:00.000");
    assert_eq!(record["coordinates"], json!({ "latitude": 10.0, "longitude": 20.0 }));
    assert_eq!(record["weather"].as_array().unwrap().len(), 24);
    assert_eq!(record["weather"][23]["time"], "2021-07-04T23:00");
    assert!(record.get("marine_weather").is_none());
    assert!(record.get("tide").is_none());
}

#[test]
fn test_repeat_runs_write_identical_bytes() {
    let csv = write_csv(&[
        "2019.08.10,10-Aug-2019,2019,Unprovoked,USA,Hawaii,\"Kahana Bay, Oahu\",Snorkeling,11h00",
        "2018.06.02,02-Jun-2018,2018,Unprovoked,AUSTRALIA,New South Wales,Ballina,Surfing,07h15",
        "1938.01.20,20-Jan-1938,1938,Unprovoked,AUSTRALIA,New South Wales,Coogee,Swimming,15h00",
        "2017.03.11,11-Mar-2017,2017,Provoked,SOUTH AFRICA,Western Cape,Nowhere Point,Fishing,09h40",
        "2016.12.24,24-Dec-2016,2016,Unprovoked,BAHAMAS,,Tiger Beach,Diving,16h05",
    ]);
    let out_dir = TempDir::new().unwrap();
    let rows = read_incidents(csv.path()).unwrap();
    let geocoder = StubGeocoder::new();

    let mut outputs = Vec::new();
    for (run, workers) in [(0, 1), (1, 4)] {
        let settings = quiet_settings(workers);
        let providers = Providers {
            geocoder: &geocoder,
            weather: &StubWeather,
            marine: Some(&StubMarine),
        };
        let result = Pipeline::new(providers, &settings).run(&rows);
        assert_eq!(result.summary.total, 5);
        assert_eq!(result.summary.valid, 3);
        assert_eq!(result.summary.rejected, 1);
        assert_eq!(result.summary.geocoding_failures, 1);

        let path = out_dir.path().join(format!("run{}.json", run));
        write_output(&path, &result.records).unwrap();
        outputs.push(std::fs::read(&path).unwrap());
    }

    assert_eq!(outputs[0], outputs[1]);

    let records: Value = serde_json::from_slice(&outputs[0]).unwrap();
    let cases: Vec<&str> = records
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["case_number"].as_str().unwrap())
        .collect();
    assert_eq!(cases, ["2019.08.10", "2018.06.02", "2016.12.24"]);
    assert_eq!(records[0]["location"], "Kahana Bay, Oahu");
    assert!(records[2]["area"].is_null());
    assert_eq!(records[0]["tide"].as_array().unwrap().len(), 2);
}

#[test]
fn test_memoized_geocoder_asks_once_per_address() {
    let csv = write_csv(&[
        "2015.07.01,01-Jul-2015,2015,Unprovoked,USA,Florida,New Smyrna Beach,Surfing,08h00",
        "2015.07.02,02-Jul-2015,2015,Unprovoked,USA,Florida,New Smyrna Beach,Surfing,09h00",
        "2015.07.03,03-Jul-2015,2015,Unprovoked,USA,Florida,Ponce Inlet,Surfing,10h00",
        "2015.07.04,04-Jul-2015,2015,Unprovoked,USA,Florida,New Smyrna Beach,Wading,11h00",
    ]);
    let rows = read_incidents(csv.path()).unwrap();

    let memoized = MemoizedGeocoder::new(StubGeocoder::new());
    let settings = quiet_settings(1);
    let providers = Providers { geocoder: &memoized, weather: &StubWeather, marine: None };
    let result = Pipeline::new(providers, &settings).run(&rows);

    assert_eq!(result.records.len(), 4);
    assert_eq!(memoized.cached_addresses(), 2);
}

#[test]
fn test_historical_floor_can_be_disabled() {
    let csv = write_csv(&[
        "1938.01.20,20-Jan-1938,1938,Unprovoked,AUSTRALIA,New South Wales,Coogee,Swimming,15h00",
    ]);
    let rows = read_incidents(csv.path()).unwrap();
    let geocoder = StubGeocoder::new();
    let providers = Providers { geocoder: &geocoder, weather: &StubWeather, marine: None };

    let enforced = quiet_settings(1);
    assert_eq!(Pipeline::new(providers, &enforced).run(&rows).records.len(), 0);

    let relaxed = PipelineSettings { enforce_historical_floor: false, ..quiet_settings(1) };
    let result = Pipeline::new(providers, &relaxed).run(&rows);
    assert_eq!(result.records.len(), 1);
    assert_eq!(result.records[0].datetime, "1938-01-20T15:00:00.000");
}
