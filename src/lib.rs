pub mod adjacency;
pub mod airports;
pub mod cache;
pub mod calendar;
pub mod config;
pub mod delay;
pub mod driver;
pub mod error;
pub mod flight;
pub mod history;
pub mod kepler;
pub mod loader;
pub mod output;
pub mod regression;
pub mod stats;
pub mod timeslot;
pub mod weather;
