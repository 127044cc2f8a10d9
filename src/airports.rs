//! Static airport reference data: capacity and coordinates per ICAO code.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;

/// Capacity assumed for airports missing from the directory.
pub const DEFAULT_CAPACITY: f64 = 60.0;

/// Static reference data for a single airport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AirportInfo {
    pub capacity: f64,
    pub latitude: f64,
    pub longitude: f64,
}

/// Busiest European airports: (ICAO, declared hourly capacity, lat, long).
static BUILTIN_AIRPORTS: &[(&str, f64, f64, f64)] = &[
    ("EGLL", 88.0, 51.4706, -0.4619),
    ("LFPG", 120.0, 49.0097, 2.5479),
    ("EHAM", 110.0, 52.3086, 4.7639),
    ("EDDF", 104.0, 50.0333, 8.5706),
    ("LEMD", 100.0, 40.4719, -3.5626),
    ("LEBL", 78.0, 41.2971, 2.0785),
    ("LTBA", 70.0, 40.9769, 28.8146),
    ("EDDM", 90.0, 48.3538, 11.7861),
    ("LIRF", 90.0, 41.8003, 12.2389),
    ("EGKK", 55.0, 51.1481, -0.1903),
    ("LSZH", 66.0, 47.4647, 8.5492),
    ("LOWW", 74.0, 48.1103, 16.5697),
    ("EKCH", 83.0, 55.6180, 12.6561),
    ("ENGM", 80.0, 60.1939, 11.1004),
    ("ESSA", 84.0, 59.6519, 17.9186),
    ("EBBR", 74.0, 50.9014, 4.4844),
    ("LPPT", 40.0, 38.7742, -9.1342),
    ("EIDW", 48.0, 53.4213, -6.2701),
    ("EGCC", 61.0, 53.3537, -2.2750),
    ("LFPO", 70.0, 48.7233, 2.3794),
];

/// Maps ICAO codes to capacity and coordinates.
///
/// Stored on disk as a plain JSON object:
/// ```json
/// {
///   "EGLL": { "capacity": 88.0, "latitude": 51.4706, "longitude": -0.4619 }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AirportDirectory {
    entries: HashMap<String, AirportInfo>,
}

impl Default for AirportDirectory {
    fn default() -> Self {
        let entries = BUILTIN_AIRPORTS
            .iter()
            .map(|&(code, capacity, latitude, longitude)| {
                (
                    code.to_string(),
                    AirportInfo {
                        capacity,
                        latitude,
                        longitude,
                    },
                )
            })
            .collect();
        Self { entries }
    }
}

impl AirportDirectory {
    pub fn from_entries(entries: HashMap<String, AirportInfo>) -> Self {
        Self { entries }
    }

    /// Loads the directory from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let entries: HashMap<String, AirportInfo> = serde_json::from_str(&content)?;
        Ok(Self { entries })
    }

    /// Loads `path` when given, the built-in table otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn get(&self, code: &str) -> Option<&AirportInfo> {
        self.entries.get(code)
    }

    pub fn capacity(&self, code: &str) -> f64 {
        self.get(code).map_or(DEFAULT_CAPACITY, |a| a.capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_airport_gets_default_capacity() {
        let directory = AirportDirectory::default();
        assert_eq!(directory.capacity("ZZZZ"), DEFAULT_CAPACITY);
        assert_eq!(directory.capacity("EGLL"), 88.0);
    }

    #[test]
    fn test_load_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("airports.json");
        std::fs::write(
            &path,
            r#"{"EHAM": {"capacity": 12.5, "latitude": 52.3, "longitude": 4.76}}"#,
        )
        .unwrap();

        let directory = AirportDirectory::load(&path).unwrap();
        assert_eq!(directory.capacity("EHAM"), 12.5);
        assert!(directory.get("EGLL").is_none());
    }
}
