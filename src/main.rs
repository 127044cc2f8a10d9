//! CLI entry point for the flight delay feature pipeline.
//!
//! Provides subcommands for exporting linear-regression data, building
//! per-airport histories and slot features, and printing adjacency matrices.

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use flight_delay_features::{
    adjacency::{
        DEFAULT_DISTANCE_THRESHOLD_KM, FlowOptions, distance_weight_adjacency, flow_adjacency,
    },
    airports::AirportDirectory,
    config::PipelineConfig,
    driver::generate_slot_features_multiple,
    history::general_filter_airport,
    loader::{DateRange, MarketSegments, extract_flights},
    output::print_json,
    regression::{linear_regression_format, save_lr_data},
    timeslot::{DurationMode, SlotFeatures, SlotOptions},
    weather::CsvWeatherSource,
};
use std::ffi::OsStr;
use std::path::Path;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "flight_delay_features")]
#[command(about = "Turns EUROCONTROL flight extracts into delay-prediction features", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export delay-filtered flights in linear-regression format
    ExtractLr {
        #[arg(long, default_value = "2019-03-01")]
        start: NaiveDate,

        #[arg(long, default_value = "2019-03-31")]
        end: NaiveDate,

        /// ICAO codes, comma separated
        #[arg(long, required = true, value_delimiter = ',')]
        airports: Vec<String>,
    },
    /// Build (or load) one airport's flight history
    Airport {
        #[arg(long)]
        airport: String,

        #[arg(long, default_value = "2018-01-01")]
        start: NaiveDate,

        #[arg(long, default_value = "2019-12-31")]
        end: NaiveDate,

        /// Rebuild the cached history even if it exists
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Generate timeslot features for several airports
    Slots {
        #[arg(long, required = true, value_delimiter = ',')]
        airports: Vec<String>,

        /// Timeslot length in minutes
        #[arg(long, default_value_t = 15)]
        slot: u32,

        /// Represent flight duration as bin shares instead of means
        #[arg(long, default_value_t = false)]
        categorical: bool,

        /// Split output into features, labels and timestamps
        #[arg(long, default_value_t = false)]
        graph: bool,

        /// Include weather features from the weather folder
        #[arg(long, default_value_t = false)]
        weather: bool,

        #[arg(long, default_value_t = false)]
        force: bool,

        #[arg(long, default_value = "2018-01-01")]
        start: NaiveDate,

        #[arg(long, default_value = "2019-12-31")]
        end: NaiveDate,
    },
    /// Print per-slot flight counts between airports as JSON
    FlowAdjacency {
        #[arg(long, required = true, value_delimiter = ',')]
        airports: Vec<String>,

        #[arg(long, default_value_t = 60)]
        slot: u32,
    },
    /// Print the distance-weight adjacency matrix as JSON
    DistanceAdjacency {
        #[arg(long, required = true, value_delimiter = ',')]
        airports: Vec<String>,

        /// Pairs at least this far apart (km) get weight 0
        #[arg(long, default_value_t = DEFAULT_DISTANCE_THRESHOLD_KM)]
        threshold: f64,
    },
}

fn at_midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(chrono::NaiveTime::MIN)
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/flight_delay_features.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("flight_delay_features.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env();

    match cli.command {
        Commands::ExtractLr {
            start,
            end,
            airports,
        } => {
            let range = DateRange::new(start, end)?;
            let flights =
                extract_flights(&config.data_folder, &range, &MarketSegments::default())?;
            let rows = linear_regression_format(flights, &airports);
            let path = save_lr_data(&config.lr_folder, &rows)?;
            info!(path = %path.display(), rows = rows.len(), "LR export finished");
        }
        Commands::Airport {
            airport,
            start,
            end,
            force,
        } => {
            let history = general_filter_airport(
                &config,
                &airport,
                at_midnight(start),
                at_midnight(end),
                force,
            )?;
            info!(airport = %airport, flights = history.len(), "Airport history ready");
        }
        Commands::Slots {
            airports,
            slot,
            categorical,
            graph,
            weather,
            force,
            start,
            end,
        } => {
            let directory = AirportDirectory::load_or_default(config.airports_file.as_deref())?;
            // Weather is always merged into the cached table; --weather only
            // decides whether it shows up in the output.
            let source = CsvWeatherSource::new(&config.weather_folder);
            let options = SlotOptions {
                slot_minutes: slot,
                graph_format: graph,
                disable_weather: !weather,
                duration_mode: if categorical {
                    DurationMode::Categorical
                } else {
                    DurationMode::Mean
                },
                force_regenerate: force,
                start: at_midnight(start),
                end: at_midnight(end),
            };

            let results = generate_slot_features_multiple(
                &config,
                &directory,
                &source,
                &airports,
                &options,
            )?;
            for (airport, features) in &results {
                match features {
                    SlotFeatures::Table(table) => info!(
                        airport = %airport,
                        rows = table.len(),
                        columns = table.columns().len(),
                        "Slot table"
                    ),
                    SlotFeatures::Graph(sample) => info!(
                        airport = %airport,
                        rows = sample.t.len(),
                        features = sample.x.columns().len(),
                        labels = sample.y.columns().len(),
                        "Graph sample"
                    ),
                }
            }
        }
        Commands::FlowAdjacency { airports, slot } => {
            let options = FlowOptions {
                slot_minutes: slot,
                ..Default::default()
            };
            let adjacency = flow_adjacency(&config, &airports, &options)?;
            print_json(&adjacency)?;
        }
        Commands::DistanceAdjacency {
            airports,
            threshold,
        } => {
            let directory = AirportDirectory::load_or_default(config.airports_file.as_deref())?;
            let matrix = distance_weight_adjacency(&directory, &airports, threshold)?;
            print_json(&matrix)?;
        }
    }

    Ok(())
}
