//! Flight records as they come out of the raw extracts.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Market segment label for flights that are not low-cost.
pub const TRADITIONAL_SCHEDULED: &str = "Traditional Scheduled";

/// ICAO flight type for scheduled flights.
pub const SCHEDULED_FLIGHT_TYPE: &str = "S";

pub mod timestamp_codec {
    //! Timestamp formats used by the raw extracts and by the pipeline's own
    //! CSV files.

    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    /// Format used by the EUROCONTROL extracts.
    pub const RAW_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

    /// Format written to every file produced by this crate.
    pub const CACHE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn format(t: &NaiveDateTime) -> String {
        t.format(CACHE_FORMAT).to_string()
    }

    pub fn parse(s: &str) -> chrono::ParseResult<NaiveDateTime> {
        NaiveDateTime::parse_from_str(s, CACHE_FORMAT)
    }

    pub fn serialize<S>(t: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(t))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = String::deserialize(deserializer)?;
        parse(&s).map_err(|e| D::Error::custom(format!("Invalid timestamp '{s}': {e}")))
    }
}

/// One row of a raw extract, before any filtering.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFlightRow {
    #[serde(rename = "ECTRL ID")]
    pub ectrl_id: u64,
    #[serde(rename = "ADEP")]
    pub adep: String,
    #[serde(rename = "ADEP Latitude")]
    pub adep_lat: Option<f64>,
    #[serde(rename = "ADEP Longitude")]
    pub adep_long: Option<f64>,
    #[serde(rename = "ADES")]
    pub ades: String,
    #[serde(rename = "ADES Latitude")]
    pub ades_lat: Option<f64>,
    #[serde(rename = "ADES Longitude")]
    pub ades_long: Option<f64>,
    #[serde(rename = "FILED OFF BLOCK TIME")]
    pub filed_obt: Option<String>,
    #[serde(rename = "FILED ARRIVAL TIME")]
    pub filed_at: Option<String>,
    #[serde(rename = "ACTUAL OFF BLOCK TIME")]
    pub actual_obt: Option<String>,
    #[serde(rename = "ACTUAL ARRIVAL TIME")]
    pub actual_at: Option<String>,
    #[serde(rename = "AC Type")]
    pub ac_type: String,
    #[serde(rename = "AC Operator")]
    pub ac_operator: String,
    #[serde(rename = "ICAO Flight Type")]
    pub icao_flight_type: String,
    #[serde(rename = "STATFOR Market Segment")]
    pub market_segment: String,
    #[serde(rename = "Actual Distance Flown (nm)")]
    pub actual_distance_flown: Option<f64>,
}

/// A scheduled flight with canonical column names and parsed timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightRecord {
    #[serde(rename = "ECTRLID")]
    pub ectrl_id: u64,
    #[serde(rename = "ADEP")]
    pub adep: String,
    #[serde(rename = "ADES")]
    pub ades: String,
    #[serde(rename = "FiledOBT", with = "timestamp_codec")]
    pub filed_obt: NaiveDateTime,
    #[serde(rename = "FiledAT", with = "timestamp_codec")]
    pub filed_at: NaiveDateTime,
    #[serde(rename = "ActualOBT", with = "timestamp_codec")]
    pub actual_obt: NaiveDateTime,
    #[serde(rename = "ActualAT", with = "timestamp_codec")]
    pub actual_at: NaiveDateTime,
    #[serde(rename = "ACType")]
    pub ac_type: String,
    #[serde(rename = "ACOperator")]
    pub ac_operator: String,
    #[serde(rename = "FlightType")]
    pub flight_type: String,
    #[serde(rename = "ActualDistanceFlown")]
    pub actual_distance_flown: Option<f64>,
    #[serde(rename = "ADEPLat")]
    pub adep_lat: Option<f64>,
    #[serde(rename = "ADEPLong")]
    pub adep_long: Option<f64>,
    #[serde(rename = "ADESLat")]
    pub ades_lat: Option<f64>,
    #[serde(rename = "ADESLong")]
    pub ades_long: Option<f64>,
}

impl FlightRecord {
    /// Converts a raw row into a record.
    ///
    /// Returns `Ok(None)` when any of the four timestamps is blank: such a
    /// flight can never enter delay calculations. A timestamp that is present
    /// but malformed is a data integrity error.
    pub fn from_raw(raw: RawFlightRow) -> Result<Option<Self>> {
        let id = raw.ectrl_id;
        let (Some(filed_obt), Some(filed_at), Some(actual_obt), Some(actual_at)) = (
            parse_raw_timestamp(id, raw.filed_obt.as_deref())?,
            parse_raw_timestamp(id, raw.filed_at.as_deref())?,
            parse_raw_timestamp(id, raw.actual_obt.as_deref())?,
            parse_raw_timestamp(id, raw.actual_at.as_deref())?,
        ) else {
            return Ok(None);
        };

        Ok(Some(Self {
            ectrl_id: id,
            adep: raw.adep,
            ades: raw.ades,
            filed_obt,
            filed_at,
            actual_obt,
            actual_at,
            ac_type: raw.ac_type,
            ac_operator: raw.ac_operator,
            flight_type: raw.market_segment,
            actual_distance_flown: raw.actual_distance_flown,
            adep_lat: raw.adep_lat,
            adep_long: raw.adep_long,
            ades_lat: raw.ades_lat,
            ades_long: raw.ades_long,
        }))
    }

    pub fn is_low_cost(&self) -> bool {
        self.flight_type != TRADITIONAL_SCHEDULED
    }

    pub fn is_self_loop(&self) -> bool {
        self.adep == self.ades
    }

    pub fn touches(&self, airport: &str) -> bool {
        self.adep == airport || self.ades == airport
    }

    /// Planned flight duration in minutes.
    pub fn planned_duration_minutes(&self) -> i64 {
        (self.filed_at - self.filed_obt).num_minutes()
    }
}

fn parse_raw_timestamp(id: u64, value: Option<&str>) -> Result<Option<NaiveDateTime>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => NaiveDateTime::parse_from_str(s, timestamp_codec::RAW_FORMAT)
            .map(Some)
            .map_err(|e| {
                PipelineError::DataIntegrity(format!(
                    "flight {id}: unparseable timestamp '{s}': {e}"
                ))
            }),
    }
}

/// Flight record with its derived delays in minutes (negative means early).
#[derive(Debug, Clone, PartialEq)]
pub struct DelayedFlight {
    pub flight: FlightRecord,
    pub arrival_delay: Option<i64>,
    pub departure_delay: Option<i64>,
}

/// Anything with an origin and a destination airport.
pub trait Route {
    fn origin(&self) -> &str;
    fn destination(&self) -> &str;
}

impl Route for FlightRecord {
    fn origin(&self) -> &str {
        &self.adep
    }

    fn destination(&self) -> &str {
        &self.ades
    }
}

impl Route for DelayedFlight {
    fn origin(&self) -> &str {
        &self.flight.adep
    }

    fn destination(&self) -> &str {
        &self.flight.ades
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::midnight;
    use chrono::Duration;

    /// A flight between two airports with the given filed schedule.
    pub(crate) fn sample_flight(
        id: u64,
        adep: &str,
        ades: &str,
        filed_obt: NaiveDateTime,
        filed_at: NaiveDateTime,
    ) -> FlightRecord {
        FlightRecord {
            ectrl_id: id,
            adep: adep.to_string(),
            ades: ades.to_string(),
            filed_obt,
            filed_at,
            actual_obt: filed_obt,
            actual_at: filed_at,
            ac_type: "A320".to_string(),
            ac_operator: "KLM".to_string(),
            flight_type: TRADITIONAL_SCHEDULED.to_string(),
            actual_distance_flown: Some(300.0),
            adep_lat: Some(52.3086),
            adep_long: Some(4.7639),
            ades_lat: Some(51.4706),
            ades_long: Some(-0.4619),
        }
    }

    fn raw_row(filed_obt: &str) -> RawFlightRow {
        RawFlightRow {
            ectrl_id: 7,
            adep: "EHAM".to_string(),
            adep_lat: None,
            adep_long: None,
            ades: "EGLL".to_string(),
            ades_lat: None,
            ades_long: None,
            filed_obt: Some(filed_obt.to_string()),
            filed_at: Some("01-03-2019 09:30:00".to_string()),
            actual_obt: Some("01-03-2019 08:05:00".to_string()),
            actual_at: Some("01-03-2019 09:41:00".to_string()),
            ac_type: "B738".to_string(),
            ac_operator: "KLM".to_string(),
            icao_flight_type: "S".to_string(),
            market_segment: "Lowcost".to_string(),
            actual_distance_flown: None,
        }
    }

    #[test]
    fn test_from_raw_parses_raw_format() {
        let record = FlightRecord::from_raw(raw_row("01-03-2019 08:00:00"))
            .unwrap()
            .unwrap();
        assert_eq!(record.filed_obt, midnight(2019, 3, 1) + Duration::hours(8));
        assert_eq!(record.planned_duration_minutes(), 90);
        assert!(record.is_low_cost());
    }

    #[test]
    fn test_from_raw_skips_blank_timestamp() {
        assert!(FlightRecord::from_raw(raw_row("  ")).unwrap().is_none());
    }

    #[test]
    fn test_from_raw_rejects_malformed_timestamp() {
        let result = FlightRecord::from_raw(raw_row("2019-03-01 08:00:00"));
        assert!(matches!(result, Err(PipelineError::DataIntegrity(_))));
    }

    #[test]
    fn test_cache_format_round_trips() {
        let t = midnight(2019, 12, 31) + Duration::seconds(86_399);
        let text = timestamp_codec::format(&t);
        assert_eq!(text, "2019-12-31 23:59:59");
        assert_eq!(timestamp_codec::parse(&text).unwrap(), t);
    }
}
