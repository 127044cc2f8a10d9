//! Per-airport timeslot features.
//!
//! Irregular flight events at one airport are turned into a dense grid of
//! fixed-width slots restricted to the months the extracts cover. The full
//! grid is cached per airport and slot length; callers get a projection of it
//! for their window, duration representation and weather setting.

pub mod aggregate;
pub mod role;
pub mod table;

use chrono::NaiveDateTime;
use tracing::info;

use crate::airports::AirportDirectory;
use crate::cache::{CacheKey, CacheStore};
use crate::calendar::{SlotLength, dense_grid};
use crate::config::{PipelineConfig, midnight};
use crate::error::{PipelineError, Result};
use crate::flight::timestamp_codec;
use crate::history::general_filter_airport;
use crate::weather::{WEATHER_COLUMNS, WeatherSource};

use aggregate::{DURATION_BIN_COLUMNS, MEAN_DURATION_COLUMNS, aggregate_slots, merge_weather};
use role::TaggedFlight;
pub use table::FeatureTable;

/// Label columns of the graph format.
pub const LABEL_COLUMNS: &[&str] = &["arrivalsArrivalDelay", "departuresDepartureDelay"];

/// How planned flight duration is represented in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurationMode {
    /// Mean duration per role.
    #[default]
    Mean,
    /// Share of flights per role in each duration bin.
    Categorical,
}

#[derive(Debug, Clone)]
pub struct SlotOptions {
    pub slot_minutes: u32,
    /// Split the output into features, labels and timestamps.
    pub graph_format: bool,
    pub disable_weather: bool,
    pub duration_mode: DurationMode,
    pub force_regenerate: bool,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Default for SlotOptions {
    fn default() -> Self {
        Self {
            slot_minutes: 15,
            graph_format: false,
            disable_weather: true,
            duration_mode: DurationMode::Mean,
            force_regenerate: false,
            start: midnight(2018, 1, 1),
            end: midnight(2019, 12, 31),
        }
    }
}

impl SlotOptions {
    pub fn validate(&self) -> Result<()> {
        if self.graph_format && self.duration_mode == DurationMode::Categorical {
            return Err(PipelineError::Configuration(
                "graph format and categorical flight duration are not compatible".to_string(),
            ));
        }
        SlotLength::minutes(self.slot_minutes)?;
        Ok(())
    }
}

/// Features, labels and slot timestamps for graph models.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphSample {
    pub x: FeatureTable,
    pub y: FeatureTable,
    pub t: Vec<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlotFeatures {
    Table(FeatureTable),
    Graph(GraphSample),
}

pub fn slot_file_name(airport: &str, slot_minutes: u32) -> String {
    format!("{airport}_{slot_minutes}m.csv")
}

fn slot_cache_key(
    config: &PipelineConfig,
    airport: &str,
    slot_minutes: u32,
    weather_fingerprint: String,
) -> CacheKey {
    CacheKey {
        slot_minutes: Some(i64::from(slot_minutes)),
        window: Some((
            timestamp_codec::format(&config.default_start),
            timestamp_codec::format(&config.default_end),
        )),
        months: Some(config.available_months.months().to_vec()),
        weather: Some(weather_fingerprint),
        ..CacheKey::for_airport(airport)
    }
}

/// Aggregates every flight at `airport` into slots of `options.slot_minutes`.
///
/// The cached table covers the configured default window and carries both
/// duration representations and the weather of `weather`, even when the
/// output drops it; the requested window and shape are applied after it is
/// loaded or built. The cache is keyed on the weather fingerprint, so a
/// different source or a changed weather file rebuilds it.
#[tracing::instrument(skip(config, directory, weather, options), fields(slot = options.slot_minutes))]
pub fn generate_slot_features(
    config: &PipelineConfig,
    directory: &AirportDirectory,
    weather: &dyn WeatherSource,
    airport: &str,
    options: &SlotOptions,
) -> Result<SlotFeatures> {
    options.validate()?;
    if config.available_months.is_empty() {
        return Err(PipelineError::Configuration(
            "no available months configured".to_string(),
        ));
    }

    let store = CacheStore::new(&config.nn_folder);
    let file_name = slot_file_name(airport, options.slot_minutes);
    let fingerprint = weather.fingerprint(airport, i64::from(options.slot_minutes));
    let key = slot_cache_key(config, airport, options.slot_minutes, fingerprint);

    let cached = if options.force_regenerate {
        None
    } else {
        store.lookup(&file_name, &key)
    };
    let full = match cached {
        Some(path) => FeatureTable::read_csv(&path)?,
        None => {
            info!(airport, "Generating slot features");
            let table = build_slot_table(config, directory, weather, airport, options.slot_minutes)?;
            store.store(&file_name, &key, |path| table.write_csv(path))?;
            table
        }
    };

    shape_output(full, options)
}

/// Builds the full-grid table for the configured default window.
pub fn build_slot_table(
    config: &PipelineConfig,
    directory: &AirportDirectory,
    weather: &dyn WeatherSource,
    airport: &str,
    slot_minutes: u32,
) -> Result<FeatureTable> {
    let slot = SlotLength::minutes(slot_minutes)?;
    let history = general_filter_airport(
        config,
        airport,
        config.default_start,
        config.default_end,
        false,
    )?;

    let tagged = history
        .iter()
        .map(|f| TaggedFlight::tag(f, airport))
        .collect::<Result<Vec<_>>>()?;

    let grid = dense_grid(
        config.default_start,
        config.default_end,
        slot,
        &config.available_months,
    );
    let aggregates = aggregate_slots(&tagged, &grid, slot, directory.capacity(airport));
    let weather_rows = weather.fetch(airport, slot.as_minutes())?;

    info!(
        airport,
        flights = tagged.len(),
        slots = grid.len(),
        weather_rows = weather_rows.len(),
        "Slots aggregated"
    );
    merge_weather(&aggregates, &weather_rows)
}

/// Applies the duration representation, window, weather setting and graph
/// split to a full-grid table.
pub fn shape_output(full: FeatureTable, options: &SlotOptions) -> Result<SlotFeatures> {
    let dropped = match options.duration_mode {
        DurationMode::Categorical => MEAN_DURATION_COLUMNS,
        DurationMode::Mean => DURATION_BIN_COLUMNS,
    };
    let mut table = full
        .drop_columns(dropped)
        .filter_window(options.start, options.end);

    if options.disable_weather {
        table = table.drop_columns(WEATHER_COLUMNS);
    }

    if !options.graph_format {
        return Ok(SlotFeatures::Table(table));
    }

    let y = table.select_columns(LABEL_COLUMNS)?;
    let t = table.timeslots().to_vec();
    let mut not_features = LABEL_COLUMNS.to_vec();
    not_features.push("departuresArrivalDelay");
    let x = table.drop_columns(&not_features);
    Ok(SlotFeatures::Graph(GraphSample { x, y, t }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeslot::aggregate::SLOT_COLUMNS;
    use chrono::Duration;

    fn full_table() -> FeatureTable {
        let columns = SLOT_COLUMNS
            .iter()
            .chain(WEATHER_COLUMNS)
            .map(|c| c.to_string())
            .collect();
        let mut table = FeatureTable::new(columns);
        let width = SLOT_COLUMNS.len() + WEATHER_COLUMNS.len();
        for i in 0..4 {
            let t = midnight(2019, 3, 1) + Duration::minutes(15 * i);
            table.push(t, vec![i as f64; width]).unwrap();
        }
        table
    }

    #[test]
    fn test_graph_and_categorical_is_a_configuration_error() {
        let options = SlotOptions {
            graph_format: true,
            duration_mode: DurationMode::Categorical,
            ..Default::default()
        };
        assert!(matches!(
            options.validate(),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn test_mean_mode_drops_bin_columns() {
        let options = SlotOptions {
            start: midnight(2019, 3, 1),
            end: midnight(2019, 3, 2),
            ..Default::default()
        };
        let SlotFeatures::Table(table) = shape_output(full_table(), &options).unwrap() else {
            panic!("expected table output");
        };
        assert!(DURATION_BIN_COLUMNS.iter().all(|c| !table.has_column(c)));
        assert!(MEAN_DURATION_COLUMNS.iter().all(|c| table.has_column(c)));
        assert!(WEATHER_COLUMNS.iter().all(|c| !table.has_column(c)));
    }

    #[test]
    fn test_categorical_mode_drops_mean_columns() {
        let options = SlotOptions {
            duration_mode: DurationMode::Categorical,
            disable_weather: false,
            start: midnight(2019, 3, 1),
            end: midnight(2019, 3, 2),
            ..Default::default()
        };
        let SlotFeatures::Table(table) = shape_output(full_table(), &options).unwrap() else {
            panic!("expected table output");
        };
        assert!(DURATION_BIN_COLUMNS.iter().all(|c| table.has_column(c)));
        assert!(MEAN_DURATION_COLUMNS.iter().all(|c| !table.has_column(c)));
        assert!(WEATHER_COLUMNS.iter().all(|c| table.has_column(c)));
    }

    #[test]
    fn test_graph_split() {
        let start = midnight(2019, 3, 1) + Duration::minutes(15);
        let options = SlotOptions {
            graph_format: true,
            start,
            end: start + Duration::minutes(30),
            ..Default::default()
        };
        let SlotFeatures::Graph(sample) = shape_output(full_table(), &options).unwrap() else {
            panic!("expected graph output");
        };

        assert_eq!(sample.t, vec![start, start + Duration::minutes(15)]);
        assert_eq!(sample.y.columns(), LABEL_COLUMNS);
        assert_eq!(sample.y.rows()[0], vec![1.0, 1.0]);
        for dropped in LABEL_COLUMNS.iter().chain(&["departuresArrivalDelay"]) {
            assert!(!sample.x.has_column(dropped));
        }
        assert!(sample.x.has_column("departing"));
        assert_eq!(sample.x.len(), 2);
    }
}
