//! Folder layout and default windows for a pipeline run.
//!
//! Values come from the environment (a `.env` file is honoured by the binary)
//! and fall back to the folder names the extracted datasets have always used.

use chrono::{NaiveDate, NaiveDateTime};
use std::path::PathBuf;

use crate::calendar::MonthAllowList;

/// Market segments kept by the loader unless the caller asks for others.
pub const DEFAULT_MARKET_SEGMENTS: &[&str] = &["Traditional Scheduled", "Lowcost"];

/// First and last calendar years covered by the raw extracts.
pub const FIRST_SUPPORTED_YEAR: i32 = 2015;
pub const LAST_SUPPORTED_YEAR: i32 = 2019;

/// Months the raw extracts actually contain.
pub const AVAILABLE_MONTHS: &[u32] = &[3, 6, 9, 12];

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_folder: PathBuf,
    pub filtered_folder: PathBuf,
    pub nn_folder: PathBuf,
    pub lr_folder: PathBuf,
    pub kepler_folder: PathBuf,
    pub weather_folder: PathBuf,
    pub airports_file: Option<PathBuf>,
    /// Window materialized into every cache file, independent of the
    /// window a caller asks for.
    pub default_start: NaiveDateTime,
    pub default_end: NaiveDateTime,
    pub available_months: MonthAllowList,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_folder: PathBuf::from("data"),
            filtered_folder: PathBuf::from("filteredData"),
            nn_folder: PathBuf::from("NNData"),
            lr_folder: PathBuf::from("LRData"),
            kepler_folder: PathBuf::from("keplerData"),
            weather_folder: PathBuf::from("weatherData"),
            airports_file: None,
            default_start: midnight(2018, 1, 1),
            default_end: midnight(2019, 12, 31),
            available_months: MonthAllowList::new(AVAILABLE_MONTHS),
        }
    }
}

impl PipelineConfig {
    /// Builds a config from environment variables, keeping defaults for
    /// anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let folder = |key: &str, fallback: PathBuf| {
            std::env::var(key).map(PathBuf::from).unwrap_or(fallback)
        };

        Self {
            data_folder: folder("DATA_FOLDER", defaults.data_folder),
            filtered_folder: folder("FILTERED_DATA_FOLDER", defaults.filtered_folder),
            nn_folder: folder("NN_DATA_FOLDER", defaults.nn_folder),
            lr_folder: folder("LR_DATA_FOLDER", defaults.lr_folder),
            kepler_folder: folder("KEPLER_DATA_FOLDER", defaults.kepler_folder),
            weather_folder: folder("WEATHER_FOLDER", defaults.weather_folder),
            airports_file: std::env::var("AIRPORTS_FILE").ok().map(PathBuf::from),
            ..defaults
        }
    }

    /// Config with every folder placed under `root`. Handy for tests and
    /// one-off runs against a scratch directory.
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            data_folder: root.join("data"),
            filtered_folder: root.join("filteredData"),
            nn_folder: root.join("NNData"),
            lr_folder: root.join("LRData"),
            kepler_folder: root.join("keplerData"),
            weather_folder: root.join("weatherData"),
            ..Self::default()
        }
    }
}

/// Midnight of the given date, `None` for an impossible calendar date.
pub fn checked_midnight(year: i32, month: u32, day: u32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, day).and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Midnight of a literal date. Panics on an impossible one.
pub(crate) fn midnight(year: i32, month: u32, day: u32) -> NaiveDateTime {
    checked_midnight(year, month, day)
        .unwrap_or_else(|| panic!("invalid calendar date {year}-{month}-{day}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_window_spans_two_years() {
        let config = PipelineConfig::default();
        assert_eq!(config.default_start, midnight(2018, 1, 1));
        assert_eq!(config.default_end, midnight(2019, 12, 31));
    }

    #[test]
    fn test_checked_midnight_rejects_impossible_dates() {
        assert_eq!(checked_midnight(2019, 2, 30), None);
        assert_eq!(checked_midnight(2019, 13, 1), None);
        assert_eq!(checked_midnight(2020, 2, 29), Some(midnight(2020, 2, 29)));
    }

    #[test]
    fn test_rooted_at_places_all_folders_under_root() {
        let config = PipelineConfig::rooted_at("/tmp/run");
        assert_eq!(config.data_folder, PathBuf::from("/tmp/run/data"));
        assert_eq!(config.nn_folder, PathBuf::from("/tmp/run/NNData"));
        assert_eq!(config.kepler_folder, PathBuf::from("/tmp/run/keplerData"));
    }
}
