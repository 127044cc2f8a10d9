//! Map-visualization export combining slot traffic, model predictions and
//! the routes arriving in each slot.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tracing::info;

use crate::airports::AirportDirectory;
use crate::calendar::{SlotLength, dense_grid};
use crate::config::{PipelineConfig, midnight};
use crate::error::{PipelineError, Result};
use crate::flight::{DelayedFlight, FlightRecord, timestamp_codec};
use crate::history::general_filter_airport;
use crate::output::write_records;
use crate::timeslot::role::{FlightRole, TaggedFlight};

/// Arrival and departure delay of one airport in one slot, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DelayPair {
    pub arrival: f64,
    pub departure: f64,
}

#[derive(Debug, Clone)]
pub struct KeplerOptions {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub slot_minutes: u32,
}

impl Default for KeplerOptions {
    fn default() -> Self {
        Self {
            start: midnight(2019, 3, 1),
            end: midnight(2019, 4, 1),
            slot_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeplerRow {
    #[serde(rename = "Timeslot", with = "timestamp_codec")]
    pub timeslot: NaiveDateTime,
    #[serde(rename = "Total # Departing flights")]
    pub departing: u32,
    #[serde(rename = "Total # Arriving flights")]
    pub arriving: u32,
    #[serde(rename = "# Traditional flights")]
    pub traditional: u32,
    #[serde(rename = "# Lowcost flights")]
    pub low_cost: u32,
    pub airport: String,
    #[serde(rename = "Arrival delay")]
    pub predicted_arrival_delay: f64,
    #[serde(rename = "Departure delay")]
    pub predicted_departure_delay: f64,
    #[serde(rename = "Error")]
    pub error: f64,
    #[serde(rename = "ADEP")]
    pub adep: Option<String>,
    #[serde(rename = "ADES")]
    pub ades: Option<String>,
    #[serde(rename = "ADEPLat")]
    pub adep_lat: Option<f64>,
    #[serde(rename = "ADEPLong")]
    pub adep_long: Option<f64>,
    #[serde(rename = "ADESLat")]
    pub ades_lat: f64,
    #[serde(rename = "ADESLong")]
    pub ades_long: f64,
}

#[derive(Debug, Default, Clone, Copy)]
struct SlotCounts {
    departing: u32,
    arriving: u32,
    traditional: u32,
    low_cost: u32,
}

pub fn kepler_file_name(airport_count: usize, slot_minutes: u32, options: &KeplerOptions) -> String {
    format!(
        "Total_ICAOTOP{airport_count}_{slot_minutes}m_{}_{}.csv",
        options.start.format("%Y%m%d"),
        options.end.format("%Y%m%d")
    )
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn check_shape(name: &str, values: &[Vec<DelayPair>], slots: usize, airports: usize) -> Result<()> {
    if values.len() != slots {
        return Err(PipelineError::Validation(format!(
            "{name} has {} slots, expected {slots}",
            values.len()
        )));
    }
    if let Some((i, row)) = values.iter().enumerate().find(|(_, r)| r.len() != airports) {
        return Err(PipelineError::Validation(format!(
            "{name} slot {i} has {} airports, expected {airports}",
            row.len()
        )));
    }
    Ok(())
}

/// Builds the export for `airports` and writes it under the kepler folder.
///
/// `predictions` and `actual` are slot-major and airport-minor: entry
/// `[i][j]` belongs to the i-th slot of the dense grid of the requested window
/// and the j-th airport of `airports`.
#[tracing::instrument(skip_all, fields(airports = airports.len(), slot = options.slot_minutes))]
pub fn generate_kepler_data<S: AsRef<str>>(
    config: &PipelineConfig,
    directory: &AirportDirectory,
    airports: &[S],
    options: &KeplerOptions,
    predictions: &[Vec<DelayPair>],
    actual: &[Vec<DelayPair>],
) -> Result<(PathBuf, Vec<KeplerRow>)> {
    let slot = SlotLength::minutes(options.slot_minutes)?;
    let grid = dense_grid(options.start, options.end, slot, &config.available_months);
    check_shape("predictions", predictions, grid.len(), airports.len())?;
    check_shape("actual", actual, grid.len(), airports.len())?;

    let names: Vec<&str> = airports.iter().map(|a| a.as_ref()).collect();
    let mut rows = Vec::new();
    for (index, airport) in names.iter().enumerate() {
        let coords = directory.get(airport).ok_or_else(|| {
            PipelineError::Validation(format!("no coordinates for airport {airport}"))
        })?;
        let history = general_filter_airport(config, airport, options.start, options.end, false)?;
        let slot_predictions: Vec<(DelayPair, DelayPair)> = predictions
            .iter()
            .zip(actual)
            .map(|(p, a)| (p[index], a[index]))
            .collect();

        rows.extend(airport_rows(
            airport,
            &names,
            &history,
            &grid,
            slot,
            &slot_predictions,
            (coords.latitude, coords.longitude),
        )?);
    }

    let path = config
        .kepler_folder
        .join(kepler_file_name(names.len(), options.slot_minutes, options));
    write_records(&path, &rows)?;
    info!(path = %path.display(), rows = rows.len(), "Kepler data written");
    Ok((path, rows))
}

/// Rows of one airport: one per (slot, arriving route), or a single row with
/// no route when nothing from the airport set lands in that slot.
fn airport_rows(
    airport: &str,
    airports: &[&str],
    history: &[DelayedFlight],
    grid: &[NaiveDateTime],
    slot: SlotLength,
    slot_predictions: &[(DelayPair, DelayPair)],
    ades_coords: (f64, f64),
) -> Result<Vec<KeplerRow>> {
    let in_set: HashSet<&str> = airports.iter().copied().collect();
    let mut counts: HashMap<NaiveDateTime, SlotCounts> = HashMap::new();
    let mut routes: HashMap<NaiveDateTime, Vec<&FlightRecord>> = HashMap::new();

    for delayed in history {
        let f = &delayed.flight;
        if !(in_set.contains(f.adep.as_str()) && in_set.contains(f.ades.as_str())) {
            continue;
        }
        let tagged = TaggedFlight::tag(delayed, airport)?;
        let key = slot.floor(tagged.role.metrics().time_at_airport);
        let entry = counts.entry(key).or_default();
        match tagged.role {
            FlightRole::Arriving(_) => {
                entry.arriving += 1;
                routes.entry(key).or_default().push(f);
            }
            FlightRole::Departing(_) => entry.departing += 1,
        }
        if tagged.low_cost {
            entry.low_cost += 1;
        } else {
            entry.traditional += 1;
        }
    }

    let mut rows = Vec::new();
    for (t, (predicted, real)) in grid.iter().zip(slot_predictions) {
        let c = counts.get(t).copied().unwrap_or_default();
        let error = ((predicted.arrival - real.arrival).abs()
            + (predicted.departure - real.departure).abs())
            / 2.0;
        let row = KeplerRow {
            timeslot: *t,
            departing: c.departing,
            arriving: c.arriving,
            traditional: c.traditional,
            low_cost: c.low_cost,
            airport: airport.to_string(),
            predicted_arrival_delay: round_to(predicted.arrival, 1),
            predicted_departure_delay: round_to(predicted.departure, 1),
            error: error.round(),
            adep: None,
            ades: None,
            adep_lat: None,
            adep_long: None,
            ades_lat: ades_coords.0,
            ades_long: ades_coords.1,
        };

        match routes.get(t) {
            Some(arrivals) => rows.extend(arrivals.iter().map(|f| KeplerRow {
                adep: Some(f.adep.clone()),
                ades: Some(f.ades.clone()),
                adep_lat: f.adep_lat,
                adep_long: f.adep_long,
                ..row.clone()
            })),
            None => rows.push(row),
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flight::tests::sample_flight;
    use chrono::Duration;

    fn delayed(f: FlightRecord) -> DelayedFlight {
        DelayedFlight {
            flight: f,
            arrival_delay: Some(0),
            departure_delay: Some(0),
        }
    }

    #[test]
    fn test_file_name() {
        let options = KeplerOptions::default();
        assert_eq!(
            kepler_file_name(10, 60, &options),
            "Total_ICAOTOP10_60m_20190301_20190401.csv"
        );
    }

    #[test]
    fn test_airport_rows_join_arriving_routes() {
        let t = midnight(2019, 3, 1);
        let slot = SlotLength::minutes(60).unwrap();
        let grid = vec![t, t + Duration::hours(1), t + Duration::hours(2)];

        let mut low_cost = sample_flight(2, "EGLL", "LEMD", t, t + Duration::minutes(80));
        low_cost.flight_type = "Lowcost".to_string();
        let history = vec![
            delayed(sample_flight(1, "EHAM", "EGLL", t - Duration::hours(1), t + Duration::minutes(10))),
            delayed(low_cost),
            delayed(sample_flight(3, "LFPG", "EGLL", t, t + Duration::minutes(20))),
            delayed(sample_flight(4, "EHAM", "EGLL", t, t + Duration::minutes(40))),
        ];
        let predictions = vec![
            (
                DelayPair { arrival: 4.26, departure: 2.0 },
                DelayPair { arrival: 1.0, departure: 4.0 },
            ),
            (DelayPair::default(), DelayPair::default()),
            (DelayPair::default(), DelayPair::default()),
        ];

        let rows = airport_rows(
            "EGLL",
            &["EHAM", "EGLL", "LEMD"],
            &history,
            &grid,
            slot,
            &predictions,
            (51.47, -0.46),
        )
        .unwrap();

        // Two arrivals from EHAM in the first slot, no arrivals after that.
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].arriving, 2);
        assert_eq!(rows[0].departing, 1);
        assert_eq!(rows[0].traditional, 2);
        assert_eq!(rows[0].low_cost, 1);
        assert_eq!(rows[0].adep.as_deref(), Some("EHAM"));
        assert_eq!(rows[1].adep.as_deref(), Some("EHAM"));
        assert_eq!(rows[0].predicted_arrival_delay, 4.3);
        assert_eq!(rows[0].error, 3.0);
        assert_eq!(rows[0].ades_lat, 51.47);

        assert_eq!(rows[2].timeslot, t + Duration::hours(1));
        assert_eq!(rows[2].arriving, 0);
        assert!(rows[2].adep.is_none());
        assert_eq!(rows[3].timeslot, t + Duration::hours(2));
    }

    #[test]
    fn test_prediction_length_must_match_grid() {
        let pairs = vec![vec![DelayPair::default(); 2]; 3];
        assert!(check_shape("predictions", &pairs, 3, 2).is_ok());
        assert!(matches!(
            check_shape("predictions", &pairs, 4, 2),
            Err(PipelineError::Validation(_))
        ));
        assert!(matches!(
            check_shape("actual", &pairs, 3, 3),
            Err(PipelineError::Validation(_))
        ));
    }
}
