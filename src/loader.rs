//! Reads the yearly EUROCONTROL extracts into typed flight records.

use chrono::{Datelike, NaiveDate};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::{DEFAULT_MARKET_SEGMENTS, FIRST_SUPPORTED_YEAR, LAST_SUPPORTED_YEAR};
use crate::error::{PipelineError, Result};
use crate::flight::{FlightRecord, RawFlightRow, SCHEDULED_FLIGHT_TYPE};

/// Inclusive range of dates whose yearly files are scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Validates that both ends fall within the supported years and that the
    /// range is not inverted.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        for (label, date) in [("start", start), ("end", end)] {
            if !(FIRST_SUPPORTED_YEAR..=LAST_SUPPORTED_YEAR).contains(&date.year()) {
                return Err(PipelineError::Validation(format!(
                    "Incorrect {label} date (must be between {FIRST_SUPPORTED_YEAR} and {LAST_SUPPORTED_YEAR}): {date}"
                )));
            }
        }
        if end < start {
            return Err(PipelineError::Validation(format!(
                "Entered end before start ({start} > {end})"
            )));
        }
        Ok(Self { start, end })
    }

    /// The whole supported dataset.
    pub fn full() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(FIRST_SUPPORTED_YEAR, 1, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(LAST_SUPPORTED_YEAR, 12, 31).unwrap_or_default(),
        }
    }

    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.start.year()..=self.end.year()
    }
}

/// Which market segments to keep.
#[derive(Debug, Clone)]
pub struct MarketSegments(Vec<String>);

impl Default for MarketSegments {
    fn default() -> Self {
        Self::new(DEFAULT_MARKET_SEGMENTS)
    }
}

impl MarketSegments {
    pub fn new(segments: &[&str]) -> Self {
        Self(segments.iter().map(|s| s.to_string()).collect())
    }

    pub fn contains(&self, segment: &str) -> bool {
        self.0.iter().any(|s| s == segment)
    }
}

/// Lists every flight file for the years in `range`, in path order.
pub fn list_flight_files(data_folder: &Path, range: &DateRange) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for year in range.years() {
        let pattern = format!("{}/{year}/*/Flights_2*.csv*", data_folder.display());
        let mut year_files: Vec<_> = glob::glob(&pattern)?.filter_map(|p| p.ok()).collect();
        year_files.sort();
        files.extend(year_files);
    }
    Ok(files)
}

/// Loads, filters and deduplicates all flights for the years in `range`.
///
/// Only scheduled flights in an allowed market segment that do not start and
/// end at the same airport are kept. Duplicate flight IDs are resolved by a
/// stable sort on the ID, keeping the last record of each run.
#[tracing::instrument(skip(segments), fields(data_folder = %data_folder.display()))]
pub fn extract_flights(
    data_folder: &Path,
    range: &DateRange,
    segments: &MarketSegments,
) -> Result<Vec<FlightRecord>> {
    let files = list_flight_files(data_folder, range)?;
    info!(file_count = files.len(), "Reading flight files");

    let mut flights = Vec::new();
    for file in &files {
        let before = flights.len();
        read_flight_file(file, segments, &mut flights)?;
        debug!(
            file = %file.display(),
            kept = flights.len() - before,
            "Flight file read"
        );
    }

    let loaded = flights.len();
    let flights = dedup_by_id(flights);
    info!(
        loaded,
        unique = flights.len(),
        "Flight extraction complete"
    );
    Ok(flights)
}

/// Stable sort by flight ID, then keep the last record of each ID.
pub fn dedup_by_id(mut flights: Vec<FlightRecord>) -> Vec<FlightRecord> {
    flights.sort_by_key(|f| f.ectrl_id);

    let mut unique: Vec<FlightRecord> = Vec::with_capacity(flights.len());
    for flight in flights {
        match unique.last_mut() {
            Some(last) if last.ectrl_id == flight.ectrl_id => *last = flight,
            _ => unique.push(flight),
        }
    }
    unique
}

fn open_flight_file(path: &Path) -> Result<BufReader<Box<dyn Read>>> {
    let file = File::open(path)?;
    let inner: Box<dyn Read> = if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(BufReader::with_capacity(64 * 1024, inner))
}

/// Extracts use either `;` or `,`; the header line decides.
fn sniff_delimiter(reader: &mut impl BufRead) -> Result<u8> {
    let buffer = reader.fill_buf()?;
    let header = buffer.split(|&b| b == b'\n').next().unwrap_or_default();
    Ok(if header.contains(&b';') { b';' } else { b',' })
}

fn read_flight_file(
    path: &Path,
    segments: &MarketSegments,
    out: &mut Vec<FlightRecord>,
) -> Result<()> {
    let mut reader = open_flight_file(path)?;
    let delimiter = sniff_delimiter(&mut reader)?;
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let mut blank_timestamps = 0usize;
    for result in rdr.deserialize::<RawFlightRow>() {
        let raw = result.map_err(|e| {
            PipelineError::DataIntegrity(format!("{}: {e}", path.display()))
        })?;

        if raw.icao_flight_type != SCHEDULED_FLIGHT_TYPE || !segments.contains(&raw.market_segment)
        {
            continue;
        }

        match FlightRecord::from_raw(raw)? {
            Some(flight) if !flight.is_self_loop() => out.push(flight),
            Some(_) => {}
            None => blank_timestamps += 1,
        }
    }

    if blank_timestamps > 0 {
        debug!(
            file = %path.display(),
            blank_timestamps,
            "Skipped flights with missing timestamps"
        );
    }
    Ok(())
}
