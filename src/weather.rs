//! Weather features joined onto the slot grid.
//!
//! The weather service itself lives outside this crate; [`WeatherSource`] is
//! the seam it plugs into.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::warn;

use crate::error::Result;
use crate::flight::timestamp_codec;
use crate::output::read_records;

pub const WEATHER_COLUMNS: &[&str] = &[
    "visibility",
    "windspeed",
    "temperature",
    "frozenprecip",
    "surfaceliftedindex",
    "cape",
];

/// Weather observation for one slot. Blank cells are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WeatherRow {
    #[serde(with = "timestamp_codec")]
    pub timeslot: NaiveDateTime,
    pub visibility: Option<f64>,
    pub windspeed: Option<f64>,
    pub temperature: Option<f64>,
    pub frozenprecip: Option<f64>,
    pub surfaceliftedindex: Option<f64>,
    pub cape: Option<f64>,
}

impl WeatherRow {
    /// Values in [`WEATHER_COLUMNS`] order, missing ones as 0.
    pub fn values(&self) -> [f64; 6] {
        [
            self.visibility,
            self.windspeed,
            self.temperature,
            self.frozenprecip,
            self.surfaceliftedindex,
            self.cape,
        ]
        .map(|v| v.unwrap_or(0.0))
    }
}

/// Fingerprint of a source that yields no rows.
pub const NO_WEATHER_FINGERPRINT: &str = "none";

/// Provides per-slot weather for an airport. Rows are authoritative and are
/// only checked by the merge join.
pub trait WeatherSource {
    fn fetch(&self, airport: &str, slot_minutes: i64) -> Result<Vec<WeatherRow>>;

    /// Identifies the rows `fetch` would return, for cache keys. Sources
    /// that would return different rows must return different fingerprints.
    fn fingerprint(&self, airport: &str, slot_minutes: i64) -> String;
}

/// Source with no observations; every slot merges to zeros.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoWeather;

impl WeatherSource for NoWeather {
    fn fetch(&self, _airport: &str, _slot_minutes: i64) -> Result<Vec<WeatherRow>> {
        Ok(Vec::new())
    }

    fn fingerprint(&self, _airport: &str, _slot_minutes: i64) -> String {
        NO_WEATHER_FINGERPRINT.to_string()
    }
}

/// Reads pre-fetched weather from `{folder}/{AIRPORT}_{slot}m.csv`.
#[derive(Debug, Clone)]
pub struct CsvWeatherSource {
    folder: PathBuf,
}

impl CsvWeatherSource {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    fn path(&self, airport: &str, slot_minutes: i64) -> PathBuf {
        self.folder.join(format!("{airport}_{slot_minutes}m.csv"))
    }
}

/// Size and modification time of `path`, `None` when it cannot be read.
fn file_stamp(path: &Path) -> Option<(u64, u64)> {
    let meta = std::fs::metadata(path).ok()?;
    let modified = meta.modified().ok()?.duration_since(UNIX_EPOCH).ok()?;
    Some((meta.len(), modified.as_nanos() as u64))
}

impl WeatherSource for CsvWeatherSource {
    fn fetch(&self, airport: &str, slot_minutes: i64) -> Result<Vec<WeatherRow>> {
        let path = self.path(airport, slot_minutes);
        if !path.exists() {
            warn!(path = %path.display(), "No weather file, weather features will be zero");
            return Ok(Vec::new());
        }
        read_records(&path)
    }

    /// A missing file reads as no weather at all.
    fn fingerprint(&self, airport: &str, slot_minutes: i64) -> String {
        match file_stamp(&self.path(airport, slot_minutes)) {
            Some((len, modified)) => format!("csv:{len}:{modified}"),
            None => NO_WEATHER_FINGERPRINT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::midnight;

    #[test]
    fn test_missing_weather_file_yields_no_rows() {
        let dir = tempfile::tempdir().unwrap();
        let source = CsvWeatherSource::new(dir.path());
        assert!(source.fetch("EGLL", 15).unwrap().is_empty());
    }

    #[test]
    fn test_reads_weather_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("EGLL_60m.csv"),
            "timeslot,visibility,windspeed,temperature,frozenprecip,surfaceliftedindex,cape\n\
             2019-03-01 00:00:00,9000,4.5,7.25,0,1.5,12\n",
        )
        .unwrap();

        let rows = CsvWeatherSource::new(dir.path()).fetch("EGLL", 60).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].timeslot, midnight(2019, 3, 1));
        assert_eq!(rows[0].values(), [9000.0, 4.5, 7.25, 0.0, 1.5, 12.0]);
    }

    #[test]
    fn test_blank_cells_read_as_zero() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("EGLL_15m.csv"),
            "timeslot,visibility,windspeed,temperature,frozenprecip,surfaceliftedindex,cape\n\
             2019-03-01 09:30:00,,4.5,7.0,0,1.5,12\n",
        )
        .unwrap();

        let rows = CsvWeatherSource::new(dir.path()).fetch("EGLL", 15).unwrap();
        assert_eq!(rows[0].visibility, None);
        assert_eq!(rows[0].values(), [0.0, 4.5, 7.0, 0.0, 1.5, 12.0]);
    }

    #[test]
    fn test_fingerprint_tracks_the_weather_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = CsvWeatherSource::new(dir.path());
        assert_eq!(source.fingerprint("EGLL", 15), NO_WEATHER_FINGERPRINT);
        assert_eq!(NoWeather.fingerprint("EGLL", 15), NO_WEATHER_FINGERPRINT);

        std::fs::write(
            dir.path().join("EGLL_15m.csv"),
            "timeslot,visibility,windspeed,temperature,frozenprecip,surfaceliftedindex,cape\n",
        )
        .unwrap();
        let with_file = source.fingerprint("EGLL", 15);
        assert!(with_file.starts_with("csv:"));
        assert_ne!(with_file, NO_WEATHER_FINGERPRINT);
        assert_eq!(source.fingerprint("EHAM", 15), NO_WEATHER_FINGERPRINT);
    }
}
