//! Flat per-flight table for linear regression models.

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::delay::{DelayKind, calculate_delays, filter_airports};
use crate::error::Result;
use crate::flight::{FlightRecord, timestamp_codec};
use crate::output::{read_records, write_records};

pub const LR_FILE_NAME: &str = "LRDATA.csv";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LrRow {
    #[serde(rename = "ADEP")]
    pub adep: String,
    #[serde(rename = "ADES")]
    pub ades: String,
    #[serde(rename = "FiledOBT", with = "timestamp_codec")]
    pub filed_obt: NaiveDateTime,
    #[serde(rename = "FiledAT", with = "timestamp_codec")]
    pub filed_at: NaiveDateTime,
    #[serde(rename = "ACType")]
    pub ac_type: String,
    #[serde(rename = "ACOperator")]
    pub ac_operator: String,
    #[serde(rename = "ArrivalDelay")]
    pub arrival_delay: i64,
    #[serde(rename = "DepartureDelay")]
    pub departure_delay: i64,
    #[serde(rename = "ADEPLat")]
    pub adep_lat: Option<f64>,
    #[serde(rename = "ADEPLong")]
    pub adep_long: Option<f64>,
    #[serde(rename = "ADESLat")]
    pub ades_lat: Option<f64>,
    #[serde(rename = "ADESLong")]
    pub ades_long: Option<f64>,
    /// Month of the filed arrival, 1-12.
    pub month: u32,
    /// Day of week of the filed arrival, Monday = 0.
    pub weekday: u32,
    #[serde(rename = "filedATminutes")]
    pub filed_at_minutes: u32,
    #[serde(rename = "filedOBTminutes")]
    pub filed_obt_minutes: u32,
}

fn minute_of_day(t: &NaiveDateTime) -> u32 {
    t.hour() * 60 + t.minute()
}

/// Flights touching any of `airports`, delay-filtered and flattened into
/// regression rows.
pub fn linear_regression_format<S: AsRef<str>>(
    flights: Vec<FlightRecord>,
    airports: &[S],
) -> Vec<LrRow> {
    let flights = filter_airports(flights, airports);
    calculate_delays(flights, DelayKind::ALL)
        .into_iter()
        .filter_map(|d| {
            let f = d.flight;
            Some(LrRow {
                arrival_delay: d.arrival_delay?,
                departure_delay: d.departure_delay?,
                month: f.filed_at.month(),
                weekday: f.filed_at.weekday().num_days_from_monday(),
                filed_at_minutes: minute_of_day(&f.filed_at),
                filed_obt_minutes: minute_of_day(&f.filed_obt),
                adep: f.adep,
                ades: f.ades,
                filed_obt: f.filed_obt,
                filed_at: f.filed_at,
                ac_type: f.ac_type,
                ac_operator: f.ac_operator,
                adep_lat: f.adep_lat,
                adep_long: f.adep_long,
                ades_lat: f.ades_lat,
                ades_long: f.ades_long,
            })
        })
        .collect()
}

pub fn lr_path(lr_folder: &Path) -> PathBuf {
    lr_folder.join(LR_FILE_NAME)
}

pub fn save_lr_data(lr_folder: &Path, rows: &[LrRow]) -> Result<PathBuf> {
    let path = lr_path(lr_folder);
    write_records(&path, rows)?;
    info!(path = %path.display(), rows = rows.len(), "LR data saved");
    Ok(path)
}

pub fn read_lr_data(lr_folder: &Path) -> Result<Vec<LrRow>> {
    read_records(&lr_path(lr_folder))
}

/// Rows with `start <= FiledOBT <= end`.
pub fn filter_by_off_block(rows: Vec<LrRow>, start: NaiveDateTime, end: NaiveDateTime) -> Vec<LrRow> {
    rows.into_iter()
        .filter(|r| r.filed_obt >= start && r.filed_obt <= end)
        .collect()
}
