//! Buckets tagged flights into slots and reindexes them onto the dense grid.

use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashMap};

use crate::calendar::{CalendarFlags, DayPart, Season, SlotLength};
use crate::error::{PipelineError, Result};
use crate::stats::{RunningMean, fraction};
use crate::timeslot::role::{FlightRole, RoleMetrics, TaggedFlight};
use crate::timeslot::table::FeatureTable;
use crate::weather::{WEATHER_COLUMNS, WeatherRow};

pub const MEAN_DURATION_COLUMNS: &[&str] = &["arrivalsFlightDuration", "departuresFlightDuration"];

pub const DURATION_BIN_COLUMNS: &[&str] = &[
    "departuresFlightDuration0to3",
    "departuresFlightDuration3to6",
    "departuresFlightDuration6orMore",
    "arrivalsFlightDuration0to3",
    "arrivalsFlightDuration3to6",
    "arrivalsFlightDuration6orMore",
];

/// Columns of [`SlotAggregate::values`], in order.
pub const SLOT_COLUMNS: &[&str] = &[
    "departing",
    "arriving",
    "lowcost",
    "arrivalsFlightDuration",
    "arrivalsDepartureDelay",
    "arrivalsArrivalDelay",
    "departuresFlightDuration",
    "departuresDepartureDelay",
    "departuresArrivalDelay",
    "departuresFlightDuration0to3",
    "departuresFlightDuration3to6",
    "departuresFlightDuration6orMore",
    "arrivalsFlightDuration0to3",
    "arrivalsFlightDuration3to6",
    "arrivalsFlightDuration6orMore",
    "planes",
    "capacityFilled",
    "weekend",
    "winter",
    "spring",
    "summer",
    "autumn",
    "night",
    "morning",
    "afternoon",
    "evening",
];

#[derive(Debug, Clone, Copy, Default)]
struct RoleAccumulator {
    duration: RunningMean,
    arrival_delay: RunningMean,
    departure_delay: RunningMean,
    bins: [u32; 3],
}

impl RoleAccumulator {
    fn push(&mut self, m: &RoleMetrics) {
        self.duration.push(m.duration_minutes as f64);
        self.arrival_delay.push_opt(m.arrival_delay);
        self.departure_delay.push_opt(m.departure_delay);
        self.bins[m.duration_bin().index()] += 1;
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct SlotAccumulator {
    flights: u32,
    arriving: u32,
    departing: u32,
    low_cost: u32,
    arrivals: RoleAccumulator,
    departures: RoleAccumulator,
}

impl SlotAccumulator {
    fn push(&mut self, flight: &TaggedFlight) {
        self.flights += 1;
        if flight.low_cost {
            self.low_cost += 1;
        }
        match &flight.role {
            FlightRole::Arriving(m) => {
                self.arriving += 1;
                self.arrivals.push(m);
            }
            FlightRole::Departing(m) => {
                self.departing += 1;
                self.departures.push(m);
            }
        }
    }
}

/// Statistics of one role within a slot. Means without contributing flights
/// are zero; bin shares are over every flight in the slot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RoleSummary {
    pub flight_duration: f64,
    pub departure_delay: f64,
    pub arrival_delay: f64,
    pub duration_bins: [f64; 3],
}

impl RoleSummary {
    fn from_accumulator(acc: &RoleAccumulator, slot_flights: u32) -> Self {
        Self {
            flight_duration: acc.duration.value().unwrap_or(0.0),
            departure_delay: acc.departure_delay.value().unwrap_or(0.0),
            arrival_delay: acc.arrival_delay.value().unwrap_or(0.0),
            duration_bins: acc.bins.map(|n| fraction(n, slot_flights)),
        }
    }
}

/// Aggregated features of one slot at one airport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotAggregate {
    pub timeslot: NaiveDateTime,
    pub departing: u32,
    pub arriving: u32,
    pub low_cost: f64,
    pub arrivals: RoleSummary,
    pub departures: RoleSummary,
    pub capacity_filled: f64,
    pub calendar: CalendarFlags,
}

impl SlotAggregate {
    fn new(timeslot: NaiveDateTime, acc: &SlotAccumulator, capacity: f64) -> Self {
        Self {
            timeslot,
            departing: acc.departing,
            arriving: acc.arriving,
            low_cost: fraction(acc.low_cost, acc.flights),
            arrivals: RoleSummary::from_accumulator(&acc.arrivals, acc.flights),
            departures: RoleSummary::from_accumulator(&acc.departures, acc.flights),
            capacity_filled: f64::from(acc.arriving + acc.departing) / capacity,
            calendar: CalendarFlags::of(timeslot),
        }
    }

    /// Arrivals minus departures.
    pub fn planes(&self) -> i64 {
        i64::from(self.arriving) - i64::from(self.departing)
    }

    /// Values in [`SLOT_COLUMNS`] order, booleans as 0/1.
    pub fn values(&self) -> Vec<f64> {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        let c = &self.calendar;
        let (a, d) = (&self.arrivals, &self.departures);
        vec![
            f64::from(self.departing),
            f64::from(self.arriving),
            self.low_cost,
            a.flight_duration,
            a.departure_delay,
            a.arrival_delay,
            d.flight_duration,
            d.departure_delay,
            d.arrival_delay,
            d.duration_bins[0],
            d.duration_bins[1],
            d.duration_bins[2],
            a.duration_bins[0],
            a.duration_bins[1],
            a.duration_bins[2],
            self.planes() as f64,
            self.capacity_filled,
            flag(c.weekend),
            flag(c.season == Season::Winter),
            flag(c.season == Season::Spring),
            flag(c.season == Season::Summer),
            flag(c.season == Season::Autumn),
            flag(c.day_part == DayPart::Night),
            flag(c.day_part == DayPart::Morning),
            flag(c.day_part == DayPart::Afternoon),
            flag(c.day_part == DayPart::Evening),
        ]
    }
}

/// Groups flights by the slot of their time at the airport and emits exactly
/// one aggregate per grid slot. Slots without flights are zero-filled and
/// flights outside the grid are dropped.
pub fn aggregate_slots(
    flights: &[TaggedFlight],
    grid: &[NaiveDateTime],
    slot: SlotLength,
    capacity: f64,
) -> Vec<SlotAggregate> {
    let mut buckets: BTreeMap<NaiveDateTime, SlotAccumulator> = BTreeMap::new();
    for flight in flights {
        let key = slot.floor(flight.role.metrics().time_at_airport);
        buckets.entry(key).or_default().push(flight);
    }

    let empty = SlotAccumulator::default();
    grid.iter()
        .map(|&t| SlotAggregate::new(t, buckets.get(&t).unwrap_or(&empty), capacity))
        .collect()
}

/// Left-joins weather onto the aggregates by timeslot.
///
/// Each aggregate must be unique per slot; a slot with several weather rows
/// yields one output row per weather row, and a slot with none gets zeros.
/// Missing (NaN) weather values are also zeroed.
pub fn merge_weather(aggregates: &[SlotAggregate], weather: &[WeatherRow]) -> Result<FeatureTable> {
    let mut by_slot: HashMap<NaiveDateTime, Vec<[f64; 6]>> = HashMap::new();
    for row in weather {
        let values = row.values().map(|v| if v.is_nan() { 0.0 } else { v });
        by_slot.entry(row.timeslot).or_default().push(values);
    }

    let columns = SLOT_COLUMNS
        .iter()
        .chain(WEATHER_COLUMNS)
        .map(|c| c.to_string())
        .collect();
    let mut table = FeatureTable::new(columns);

    let mut previous: Option<NaiveDateTime> = None;
    let no_weather = [[0.0; 6]];
    for agg in aggregates {
        if previous.is_some_and(|p| p >= agg.timeslot) {
            return Err(PipelineError::DataIntegrity(format!(
                "slot {} is duplicated or out of order before the weather merge",
                agg.timeslot
            )));
        }
        previous = Some(agg.timeslot);

        let base = agg.values();
        let matches = by_slot
            .get(&agg.timeslot)
            .map_or(&no_weather[..], |rows| rows.as_slice());
        for weather_values in matches {
            let mut values = base.clone();
            values.extend_from_slice(weather_values);
            table.push(agg.timeslot, values)?;
        }
    }
    Ok(table)
}
