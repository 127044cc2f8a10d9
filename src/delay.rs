//! Delay derivation and the airport filter.

use chrono::NaiveDateTime;

use crate::flight::{DelayedFlight, FlightRecord, Route};

/// Delays outside `(MIN_DELAY_MINUTES, MAX_DELAY_MINUTES)` are outliers.
pub const MIN_DELAY_MINUTES: i64 = -30;
pub const MAX_DELAY_MINUTES: i64 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayKind {
    Arrival,
    Departure,
}

impl DelayKind {
    pub const ALL: &'static [DelayKind] = &[DelayKind::Arrival, DelayKind::Departure];
}

/// Whole minutes from `filed` to `actual`, rounded towards negative infinity.
pub fn delay_minutes(filed: NaiveDateTime, actual: NaiveDateTime) -> i64 {
    (actual - filed).num_seconds().div_euclid(60)
}

fn within_band(delay: i64) -> bool {
    delay > MIN_DELAY_MINUTES && delay < MAX_DELAY_MINUTES
}

/// Computes the requested delays and drops outliers.
///
/// The band check always applies to both arrival and departure delay, even
/// when only one kind is requested; the unrequested delay stays `None`.
pub fn calculate_delays(flights: Vec<FlightRecord>, kinds: &[DelayKind]) -> Vec<DelayedFlight> {
    let want_arrival = kinds.contains(&DelayKind::Arrival);
    let want_departure = kinds.contains(&DelayKind::Departure);

    flights
        .into_iter()
        .filter_map(|flight| {
            let arrival = delay_minutes(flight.filed_at, flight.actual_at);
            let departure = delay_minutes(flight.filed_obt, flight.actual_obt);
            if !(within_band(arrival) && within_band(departure)) {
                return None;
            }
            Some(DelayedFlight {
                flight,
                arrival_delay: want_arrival.then_some(arrival),
                departure_delay: want_departure.then_some(departure),
            })
        })
        .collect()
}

/// Keeps flights whose origin or destination is one of `airports`.
pub fn filter_airports<T: Route, S: AsRef<str>>(flights: Vec<T>, airports: &[S]) -> Vec<T> {
    flights
        .into_iter()
        .filter(|f| {
            airports
                .iter()
                .any(|a| f.origin() == a.as_ref() || f.destination() == a.as_ref())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::midnight;
    use crate::flight::tests::sample_flight;
    use chrono::Duration;

    fn delayed(arrival: i64, departure: i64) -> FlightRecord {
        let obt = midnight(2019, 3, 1) + Duration::hours(8);
        let at = obt + Duration::minutes(90);
        let mut flight = sample_flight(1, "EHAM", "EGLL", obt, at);
        flight.actual_obt = obt + Duration::minutes(departure);
        flight.actual_at = at + Duration::minutes(arrival);
        flight
    }

    #[test]
    fn test_delay_minutes_floors_partial_minutes() {
        let t = midnight(2019, 3, 1);
        assert_eq!(delay_minutes(t, t + Duration::seconds(119)), 1);
        assert_eq!(delay_minutes(t, t - Duration::seconds(30)), -1);
    }

    #[test]
    fn test_band_is_exclusive() {
        let flights = vec![
            delayed(89, 0),
            delayed(90, 0),
            delayed(-29, 0),
            delayed(-30, 0),
            delayed(0, 90),
            delayed(0, -30),
        ];
        let kept = calculate_delays(flights, DelayKind::ALL);
        let arrivals: Vec<_> = kept.iter().map(|f| f.arrival_delay).collect();
        assert_eq!(arrivals, vec![Some(89), Some(-29)]);
    }

    #[test]
    fn test_both_bounds_apply_when_one_kind_requested() {
        let flights = vec![delayed(10, 120), delayed(10, 5)];
        let kept = calculate_delays(flights, &[DelayKind::Arrival]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].arrival_delay, Some(10));
        assert_eq!(kept[0].departure_delay, None);
    }

    #[test]
    fn test_outputs_stay_inside_band() {
        let flights: Vec<_> = (-40..100).step_by(7).map(|d| delayed(d, -d / 2)).collect();
        for f in calculate_delays(flights, DelayKind::ALL) {
            let a = f.arrival_delay.unwrap();
            let d = f.departure_delay.unwrap();
            assert!(a > -30 && a < 90);
            assert!(d > -30 && d < 90);
        }
    }

    #[test]
    fn test_filter_airports_matches_either_end() {
        let t = midnight(2019, 3, 1);
        let flights = vec![
            sample_flight(1, "EHAM", "EGLL", t, t),
            sample_flight(2, "LFPG", "EHAM", t, t),
            sample_flight(3, "LFPG", "EDDF", t, t),
        ];
        let kept = filter_airports(flights, &["EHAM"]);
        let ids: Vec<_> = kept.iter().map(|f| f.ectrl_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
