//! Runs the slot aggregation over several airports.

use std::collections::BTreeMap;
use tracing::info;

use crate::airports::AirportDirectory;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::timeslot::{SlotFeatures, SlotOptions, generate_slot_features};
use crate::weather::WeatherSource;

/// Generates slot features for every airport with shared options.
///
/// All results share the requested window and slot length, so their grids
/// line up; nothing else is aligned across airports. The first failing
/// airport aborts the run.
#[tracing::instrument(skip_all, fields(airports = airports.len(), slot = options.slot_minutes))]
pub fn generate_slot_features_multiple<S: AsRef<str>>(
    config: &PipelineConfig,
    directory: &AirportDirectory,
    weather: &dyn WeatherSource,
    airports: &[S],
    options: &SlotOptions,
) -> Result<BTreeMap<String, SlotFeatures>> {
    options.validate()?;

    let mut results = BTreeMap::new();
    for (i, airport) in airports.iter().enumerate() {
        let airport = airport.as_ref();
        let features = generate_slot_features(config, directory, weather, airport, options)?;
        info!(
            airport,
            progress = %format!("{}/{}", i + 1, airports.len()),
            "Airport done"
        );
        results.insert(airport.to_string(), features);
    }
    Ok(results)
}
