//! Per-airport flight history, cached on disk.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::{CacheKey, CacheStore};
use crate::config::PipelineConfig;
use crate::delay::{DelayKind, calculate_delays};
use crate::error::Result;
use crate::flight::{DelayedFlight, FlightRecord, timestamp_codec};
use crate::loader::{DateRange, MarketSegments, extract_flights};
use crate::output::{read_records, write_records};

/// Row layout of `general{AIRPORT}.csv`.
#[derive(Debug, Serialize, Deserialize)]
struct HistoryRow {
    #[serde(rename = "ECTRLID")]
    ectrl_id: u64,
    #[serde(rename = "ADEP")]
    adep: String,
    #[serde(rename = "ADES")]
    ades: String,
    #[serde(rename = "FiledOBT", with = "timestamp_codec")]
    filed_obt: NaiveDateTime,
    #[serde(rename = "FiledAT", with = "timestamp_codec")]
    filed_at: NaiveDateTime,
    #[serde(rename = "ActualOBT", with = "timestamp_codec")]
    actual_obt: NaiveDateTime,
    #[serde(rename = "ActualAT", with = "timestamp_codec")]
    actual_at: NaiveDateTime,
    #[serde(rename = "ACType")]
    ac_type: String,
    #[serde(rename = "ACOperator")]
    ac_operator: String,
    #[serde(rename = "FlightType")]
    flight_type: String,
    #[serde(rename = "ActualDistanceFlown")]
    actual_distance_flown: Option<f64>,
    #[serde(rename = "ADEPLat")]
    adep_lat: Option<f64>,
    #[serde(rename = "ADEPLong")]
    adep_long: Option<f64>,
    #[serde(rename = "ADESLat")]
    ades_lat: Option<f64>,
    #[serde(rename = "ADESLong")]
    ades_long: Option<f64>,
    #[serde(rename = "ArrivalDelay")]
    arrival_delay: Option<i64>,
    #[serde(rename = "DepartureDelay")]
    departure_delay: Option<i64>,
}

impl From<&DelayedFlight> for HistoryRow {
    fn from(d: &DelayedFlight) -> Self {
        let f = &d.flight;
        Self {
            ectrl_id: f.ectrl_id,
            adep: f.adep.clone(),
            ades: f.ades.clone(),
            filed_obt: f.filed_obt,
            filed_at: f.filed_at,
            actual_obt: f.actual_obt,
            actual_at: f.actual_at,
            ac_type: f.ac_type.clone(),
            ac_operator: f.ac_operator.clone(),
            flight_type: f.flight_type.clone(),
            actual_distance_flown: f.actual_distance_flown,
            adep_lat: f.adep_lat,
            adep_long: f.adep_long,
            ades_lat: f.ades_lat,
            ades_long: f.ades_long,
            arrival_delay: d.arrival_delay,
            departure_delay: d.departure_delay,
        }
    }
}

impl From<HistoryRow> for DelayedFlight {
    fn from(r: HistoryRow) -> Self {
        Self {
            flight: FlightRecord {
                ectrl_id: r.ectrl_id,
                adep: r.adep,
                ades: r.ades,
                filed_obt: r.filed_obt,
                filed_at: r.filed_at,
                actual_obt: r.actual_obt,
                actual_at: r.actual_at,
                ac_type: r.ac_type,
                ac_operator: r.ac_operator,
                flight_type: r.flight_type,
                actual_distance_flown: r.actual_distance_flown,
                adep_lat: r.adep_lat,
                adep_long: r.adep_long,
                ades_lat: r.ades_lat,
                ades_long: r.ades_long,
            },
            arrival_delay: r.arrival_delay,
            departure_delay: r.departure_delay,
        }
    }
}

pub fn history_file_name(airport: &str) -> String {
    format!("general{airport}.csv")
}

/// Delay-filtered flights touching `airport` with `filed_obt >= start` and
/// `filed_at < end`.
///
/// The cache always holds the configured default window, whatever window the
/// caller asks for, so it never needs merging. Flights that left the night
/// before but arrive inside the window are not returned.
#[tracing::instrument(skip(config))]
pub fn general_filter_airport(
    config: &PipelineConfig,
    airport: &str,
    start: NaiveDateTime,
    end: NaiveDateTime,
    force_regenerate: bool,
) -> Result<Vec<DelayedFlight>> {
    let history = load_history(config, airport, force_regenerate)?;
    Ok(history
        .into_iter()
        .filter(|d| d.flight.filed_obt >= start && d.flight.filed_at < end)
        .collect())
}

/// The airport's full cached history, building it on a miss.
pub fn load_history(
    config: &PipelineConfig,
    airport: &str,
    force_regenerate: bool,
) -> Result<Vec<DelayedFlight>> {
    let store = CacheStore::new(&config.filtered_folder);
    let file_name = history_file_name(airport);
    let key = CacheKey::for_airport(airport);

    if !force_regenerate {
        if let Some(path) = store.lookup(&file_name, &key) {
            let rows: Vec<HistoryRow> = read_records(&path)?;
            return Ok(rows.into_iter().map(DelayedFlight::from).collect());
        }
    }

    info!(
        airport,
        start = %config.default_start,
        end = %config.default_end,
        "Generating airport history"
    );
    let range = DateRange::new(config.default_start.date(), config.default_end.date())?;
    let flights: Vec<FlightRecord> =
        extract_flights(&config.data_folder, &range, &MarketSegments::default())?
            .into_iter()
            .filter(|f| f.touches(airport))
            .collect();
    let history = calculate_delays(flights, DelayKind::ALL);

    let rows: Vec<HistoryRow> = history.iter().map(HistoryRow::from).collect();
    store.store(&file_name, &key, |path| write_records(path, &rows))?;
    Ok(history)
}
