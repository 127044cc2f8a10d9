//! Tags each flight with the role it plays at the aggregated airport.

use chrono::NaiveDateTime;

use crate::error::{PipelineError, Result};
use crate::flight::DelayedFlight;

/// Planned flight duration bucket: `[0,3h)`, `[3h,6h)` or `[6h,∞)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationBin {
    UpTo3h,
    From3To6h,
    Over6h,
}

impl DurationBin {
    pub fn of_minutes(minutes: i64) -> Self {
        match minutes {
            m if m < 3 * 60 => DurationBin::UpTo3h,
            m if m < 6 * 60 => DurationBin::From3To6h,
            _ => DurationBin::Over6h,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            DurationBin::UpTo3h => 0,
            DurationBin::From3To6h => 1,
            DurationBin::Over6h => 2,
        }
    }
}

/// Metrics a flight contributes to the statistics of its role.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoleMetrics {
    /// Filed arrival for arrivals, filed off-block for departures.
    pub time_at_airport: NaiveDateTime,
    pub duration_minutes: i64,
    pub arrival_delay: Option<f64>,
    pub departure_delay: Option<f64>,
}

impl RoleMetrics {
    pub fn duration_bin(&self) -> DurationBin {
        DurationBin::of_minutes(self.duration_minutes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlightRole {
    Arriving(RoleMetrics),
    Departing(RoleMetrics),
}

impl FlightRole {
    pub fn metrics(&self) -> &RoleMetrics {
        match self {
            FlightRole::Arriving(m) | FlightRole::Departing(m) => m,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaggedFlight {
    pub role: FlightRole,
    pub low_cost: bool,
}

impl TaggedFlight {
    /// Tags `flight` relative to `airport`.
    ///
    /// A flight landing at the airport is an arrival; otherwise a flight
    /// leaving it is a departure. A flight that does neither should have been
    /// filtered out upstream and is rejected.
    pub fn tag(flight: &DelayedFlight, airport: &str) -> Result<Self> {
        let f = &flight.flight;
        let metrics = |time_at_airport| RoleMetrics {
            time_at_airport,
            duration_minutes: f.planned_duration_minutes(),
            arrival_delay: flight.arrival_delay.map(|d| d as f64),
            departure_delay: flight.departure_delay.map(|d| d as f64),
        };

        let role = if f.ades == airport {
            FlightRole::Arriving(metrics(f.filed_at))
        } else if f.adep == airport {
            FlightRole::Departing(metrics(f.filed_obt))
        } else {
            return Err(PipelineError::DataIntegrity(format!(
                "flight {} ({} -> {}) does not touch {airport}",
                f.ectrl_id, f.adep, f.ades
            )));
        };

        Ok(Self {
            role,
            low_cost: f.is_low_cost(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::midnight;
    use crate::flight::tests::sample_flight;
    use chrono::Duration;

    fn delayed(adep: &str, ades: &str) -> DelayedFlight {
        let obt = midnight(2019, 3, 1) + Duration::hours(8);
        DelayedFlight {
            flight: sample_flight(1, adep, ades, obt, obt + Duration::minutes(90)),
            arrival_delay: Some(4),
            departure_delay: Some(-2),
        }
    }

    #[test]
    fn test_duration_bins_are_exhaustive() {
        assert_eq!(DurationBin::of_minutes(-5), DurationBin::UpTo3h);
        assert_eq!(DurationBin::of_minutes(179), DurationBin::UpTo3h);
        assert_eq!(DurationBin::of_minutes(180), DurationBin::From3To6h);
        assert_eq!(DurationBin::of_minutes(359), DurationBin::From3To6h);
        assert_eq!(DurationBin::of_minutes(360), DurationBin::Over6h);
    }

    #[test]
    fn test_arrival_uses_filed_arrival_time() {
        let flight = delayed("EHAM", "EGLL");
        let tagged = TaggedFlight::tag(&flight, "EGLL").unwrap();
        match tagged.role {
            FlightRole::Arriving(m) => {
                assert_eq!(m.time_at_airport, flight.flight.filed_at);
                assert_eq!(m.duration_minutes, 90);
                assert_eq!(m.arrival_delay, Some(4.0));
            }
            other => panic!("expected arrival, got {other:?}"),
        }
        assert!(!tagged.low_cost);
    }

    #[test]
    fn test_departure_uses_filed_off_block_time() {
        let flight = delayed("EGLL", "EHAM");
        let tagged = TaggedFlight::tag(&flight, "EGLL").unwrap();
        assert!(matches!(tagged.role, FlightRole::Departing(_)));
        assert_eq!(tagged.role.metrics().time_at_airport, flight.flight.filed_obt);
    }

    #[test]
    fn test_unrelated_flight_is_rejected() {
        let flight = delayed("LFPG", "EHAM");
        assert!(matches!(
            TaggedFlight::tag(&flight, "EGLL"),
            Err(PipelineError::DataIntegrity(_))
        ));
    }
}
