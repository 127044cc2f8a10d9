//! Slot arithmetic and the calendar predicates that shape the dense grid.

use chrono::{DateTime, Datelike, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Decides which slots exist in the dense grid.
pub trait CalendarPolicy {
    fn includes(&self, slot: NaiveDateTime) -> bool;
}

/// Keeps slots whose month is in a fixed set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthAllowList {
    months: Vec<u32>,
}

impl MonthAllowList {
    pub fn new(months: &[u32]) -> Self {
        let mut months = months.to_vec();
        months.sort_unstable();
        months.dedup();
        Self { months }
    }

    pub fn months(&self) -> &[u32] {
        &self.months
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }
}

impl CalendarPolicy for MonthAllowList {
    fn includes(&self, slot: NaiveDateTime) -> bool {
        self.months.contains(&slot.month())
    }
}

/// Fixed slot width in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLength(i64);

impl SlotLength {
    pub fn minutes(minutes: u32) -> Result<Self> {
        if minutes == 0 {
            return Err(PipelineError::Configuration(
                "timeslot length must be at least one minute".to_string(),
            ));
        }
        Ok(Self(i64::from(minutes)))
    }

    pub fn as_minutes(&self) -> i64 {
        self.0
    }

    fn as_seconds(&self) -> i64 {
        self.0 * 60
    }

    /// Start of the slot containing `t`, on a grid anchored at the Unix epoch.
    pub fn floor(&self, t: NaiveDateTime) -> NaiveDateTime {
        let secs = t.and_utc().timestamp();
        let floored = secs - secs.rem_euclid(self.as_seconds());
        from_epoch_seconds(floored)
    }

    /// First slot boundary at or after `t`.
    pub fn ceil(&self, t: NaiveDateTime) -> NaiveDateTime {
        let floored = self.floor(t);
        if floored == t {
            t
        } else {
            floored + chrono::Duration::seconds(self.as_seconds())
        }
    }

    fn step(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.as_seconds())
    }
}

fn from_epoch_seconds(secs: i64) -> NaiveDateTime {
    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.naive_utc())
        .unwrap_or_default()
}

/// Every slot start in `[start, end)` accepted by `policy`, ascending.
///
/// The grid depends only on its arguments, never on which slots have flights.
pub fn dense_grid(
    start: NaiveDateTime,
    end: NaiveDateTime,
    slot: SlotLength,
    policy: &dyn CalendarPolicy,
) -> Vec<NaiveDateTime> {
    let mut grid = Vec::new();
    let mut current = slot.ceil(start);
    while current < end {
        if policy.includes(current) {
            grid.push(current);
        }
        current += slot.step();
    }
    grid
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    pub fn of(t: NaiveDateTime) -> Self {
        match t.month() {
            m if m > 11 || m < 3 => Season::Winter,
            m if m < 6 => Season::Spring,
            m if m < 9 => Season::Summer,
            _ => Season::Autumn,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayPart {
    Night,
    Morning,
    Afternoon,
    Evening,
}

impl DayPart {
    /// Quadrants are `[0,6)`, `[6,12)`, `[12,18)` and `[18,23]`.
    pub fn of(t: NaiveDateTime) -> Self {
        match t.hour() {
            h if h < 6 => DayPart::Night,
            h if h < 12 => DayPart::Morning,
            h if h < 18 => DayPart::Afternoon,
            _ => DayPart::Evening,
        }
    }
}

/// One-hot calendar features derived from a slot's own timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarFlags {
    pub weekend: bool,
    pub season: Season,
    pub day_part: DayPart,
}

impl CalendarFlags {
    pub fn of(t: NaiveDateTime) -> Self {
        Self {
            weekend: matches!(t.weekday(), Weekday::Sat | Weekday::Sun),
            season: Season::of(t),
            day_part: DayPart::of(t),
        }
    }
}
