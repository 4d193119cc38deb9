//! Incident CSV reader
//!
//! Reads the shark-attack dataset export. Only five columns are used and
//! located by header name, so column order and extra columns don't matter.
//! Cells are decoded leniently (invalid UTF-8 is replaced, not rejected):
//! the parser decides whether a row is usable, and a garbled cell should
//! cost one row, not the batch.

use std::io::Read;
use std::path::Path;

use csv::{ByteRecord, ReaderBuilder};

use crate::logging::{self, DataSource};
use crate::model::{IncidentRecord, PipelineError};

pub const COLUMN_CASE_NUMBER: &str = "Case Number";
pub const COLUMN_COUNTRY: &str = "Country";
pub const COLUMN_AREA: &str = "Area";
pub const COLUMN_LOCATION: &str = "Location";
pub const COLUMN_TIME: &str = "Time";

/// Column positions resolved from the header row.
struct ColumnIndex {
    case_number: usize,
    country: usize,
    area: usize,
    location: usize,
    time: usize,
}

impl ColumnIndex {
    fn from_headers(headers: &ByteRecord, label: &str) -> Result<Self, PipelineError> {
        let find = |name: &'static str| {
            headers
                .iter()
                .position(|h| String::from_utf8_lossy(h).trim() == name)
                .ok_or_else(|| PipelineError::MissingColumn {
                    path: label.to_string(),
                    column: name,
                })
        };

        Ok(Self {
            case_number: find(COLUMN_CASE_NUMBER)?,
            country: find(COLUMN_COUNTRY)?,
            area: find(COLUMN_AREA)?,
            location: find(COLUMN_LOCATION)?,
            time: find(COLUMN_TIME)?,
        })
    }

    fn record(&self, row: &ByteRecord) -> IncidentRecord {
        let cell = |i: usize| {
            row.get(i)
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                .unwrap_or_default()
        };
        IncidentRecord::from_cells(
            &cell(self.case_number),
            &cell(self.country),
            &cell(self.area),
            &cell(self.location),
            &cell(self.time),
        )
    }
}

/// Reads every incident row from a CSV file.
pub fn read_incidents(path: &Path) -> Result<Vec<IncidentRecord>, PipelineError> {
    let label = path.display().to_string();
    let file = std::fs::File::open(path).map_err(|source| PipelineError::Io {
        path: label.clone(),
        source,
    })?;
    read_incidents_from(file, &label)
}

/// Reads incident rows from any reader. `label` names the source in errors.
pub fn read_incidents_from<R: Read>(
    reader: R,
    label: &str,
) -> Result<Vec<IncidentRecord>, PipelineError> {
    let csv_error = |source| PipelineError::Csv {
        path: label.to_string(),
        source,
    };

    // Short rows are common in spreadsheet exports; missing cells read as empty.
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = reader.byte_headers().map_err(csv_error)?.clone();
    let columns = ColumnIndex::from_headers(&headers, label)?;

    let mut incidents = Vec::new();
    let mut row = ByteRecord::new();
    while reader.read_byte_record(&mut row).map_err(csv_error)? {
        incidents.push(columns.record(&row));
    }

    logging::info(
        DataSource::Csv,
        None,
        &format!("Read {} incident rows from {}", incidents.len(), label),
    );
    Ok(incidents)
}
