//! Airport-to-airport adjacency matrices for graph models.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

use crate::airports::AirportDirectory;
use crate::calendar::SlotLength;
use crate::config::{PipelineConfig, midnight};
use crate::delay::{DelayKind, calculate_delays};
use crate::error::{PipelineError, Result};
use crate::flight::{FlightRecord, timestamp_codec};
use crate::loader::{DateRange, MarketSegments, extract_flights};
use crate::stats::{mean, stddev};

/// Mean Earth radius in kilometres.
const EARTH_RADIUS_KM: f64 = 6371.0;

pub const DEFAULT_DISTANCE_THRESHOLD_KM: f64 = 1000.0;

/// Great-circle distance in kilometres between two (latitude, longitude)
/// points given in degrees.
pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = (from.0.to_radians(), from.1.to_radians());
    let (lat2, lon2) = (to.0.to_radians(), to.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Gaussian distance-decay weights between `airports`.
///
/// `w[i][j] = exp(-d²/σ²)` when `d < threshold_km`, else 0, with σ the
/// population standard deviation of all pairwise distances. The diagonal has
/// distance 0 and so weight 1. If every distance is 0, entries within the
/// threshold are 1.
pub fn distance_weight_adjacency<S: AsRef<str>>(
    directory: &AirportDirectory,
    airports: &[S],
    threshold_km: f64,
) -> Result<Vec<Vec<f64>>> {
    let coords = airports
        .iter()
        .map(|a| {
            let a = a.as_ref();
            directory
                .get(a)
                .map(|info| (info.latitude, info.longitude))
                .ok_or_else(|| PipelineError::Validation(format!("no coordinates for airport {a}")))
        })
        .collect::<Result<Vec<_>>>()?;

    let n = coords.len();
    let mut distances = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in i + 1..n {
            let d = haversine_km(coords[i], coords[j]);
            distances[i][j] = d;
            distances[j][i] = d;
        }
    }

    let flat: Vec<f64> = distances.iter().flatten().copied().collect();
    let sigma = stddev(&flat, mean(&flat));

    Ok(distances
        .iter()
        .map(|row| {
            row.iter()
                .map(|&d| match d {
                    d if d >= threshold_km => 0.0,
                    _ if sigma == 0.0 => 1.0,
                    d => (-(d * d) / (sigma * sigma)).exp(),
                })
                .collect()
        })
        .collect())
}

/// Flight counts between airports during one slot: `counts[dest][origin]`,
/// both axes in the sorted airport order of [`FlowAdjacency::airports`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowBlock {
    #[serde(with = "timestamp_codec")]
    pub timeslot: NaiveDateTime,
    pub counts: Vec<Vec<u32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowAdjacency {
    pub airports: Vec<String>,
    pub blocks: Vec<FlowBlock>,
}

#[derive(Debug, Clone)]
pub struct FlowOptions {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub slot_minutes: u32,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self {
            start: midnight(2018, 3, 1),
            end: midnight(2018, 3, 31),
            slot_minutes: 60,
        }
    }
}

/// Counts flights between `airports` per slot of filed arrival time.
///
/// Only flights with both ends in the airport set and delays inside the
/// outlier band count. One block is emitted per slot that has at least one
/// such flight, in ascending slot order.
// TODO: normalize each cell by its maximum over all blocks once cells that
// never see a flight have a defined value instead of 0/0.
pub fn flow_adjacency<S: AsRef<str>>(
    config: &PipelineConfig,
    airports: &[S],
    options: &FlowOptions,
) -> Result<FlowAdjacency> {
    let slot = SlotLength::minutes(options.slot_minutes)?;
    let range = DateRange::new(options.start.date(), options.end.date())?;
    let flights = extract_flights(&config.data_folder, &range, &MarketSegments::default())?;
    let adjacency = count_flows(flights, airports, options.start, options.end, slot);

    info!(
        airports = adjacency.airports.len(),
        blocks = adjacency.blocks.len(),
        "Flow adjacency built"
    );
    Ok(adjacency)
}

/// Builds the per-slot blocks from already loaded flights.
pub fn count_flows<S: AsRef<str>>(
    flights: Vec<FlightRecord>,
    airports: &[S],
    start: NaiveDateTime,
    end: NaiveDateTime,
    slot: SlotLength,
) -> FlowAdjacency {
    let mut sorted: Vec<String> = airports.iter().map(|a| a.as_ref().to_string()).collect();
    sorted.sort();
    sorted.dedup();
    let index: HashMap<&str, usize> = sorted
        .iter()
        .enumerate()
        .map(|(i, a)| (a.as_str(), i))
        .collect();
    let n = sorted.len();

    let within: Vec<FlightRecord> = flights
        .into_iter()
        .filter(|f| index.contains_key(f.adep.as_str()) && index.contains_key(f.ades.as_str()))
        .collect();

    let mut blocks: BTreeMap<NaiveDateTime, Vec<Vec<u32>>> = BTreeMap::new();
    for delayed in calculate_delays(within, DelayKind::ALL) {
        let f = &delayed.flight;
        if f.filed_at < start || f.filed_at >= end {
            continue;
        }
        let (Some(&dest), Some(&origin)) = (index.get(f.ades.as_str()), index.get(f.adep.as_str()))
        else {
            continue;
        };
        let block = blocks
            .entry(slot.floor(f.filed_at))
            .or_insert_with(|| vec![vec![0; n]; n]);
        block[dest][origin] += 1;
    }

    FlowAdjacency {
        airports: sorted.clone(),
        blocks: blocks
            .into_iter()
            .map(|(timeslot, counts)| FlowBlock { timeslot, counts })
            .collect(),
    }
}
