/*!

Hour-of-week arithmetic.

Exposure is stored in 168 hour-of-week buckets, `hour_of_day + 24 * day_index` with Monday as
day 0. A time interval is split at every hour boundary; each slice knows its hour of day
(used to look up hourly concentrations, always `bucket % 24`) and its hour-of-week bucket,
which can run past 167 for activity that spills into the following week. Such slices are
dropped by [`WeeklyBuckets::add`] rather than wrapped onto Monday.

*/

use crate::error::HealthError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

pub const SECONDS_PER_HOUR: f64 = 3600.0;
pub const HOURS_PER_DAY: usize = 24;
pub const DAYS_PER_WEEK: usize = 7;
pub const HOURS_PER_WEEK: usize = HOURS_PER_DAY * DAYS_PER_WEEK;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; DAYS_PER_WEEK] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
        }
    }

    /// Seconds since Monday 00:00 for `seconds_of_day` on this day. Times past midnight
    /// (e.g. a departure at 25:00) simply run into the following day.
    #[must_use]
    pub fn week_seconds(self, seconds_of_day: f64) -> f64 {
        self.index() as f64 * HOURS_PER_DAY as f64 * SECONDS_PER_HOUR + seconds_of_day.max(0.0)
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DayOfWeek {
    type Err = HealthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|day| day.name() == lower || day.name()[..3] == lower)
            .ok_or_else(|| HealthError::UnknownDay(s.to_string()))
    }
}

/// The part of an interval that falls inside one clock hour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourSlice {
    /// May be `>= HOURS_PER_WEEK` when the interval runs past Sunday midnight.
    pub hour_of_week: usize,
    pub hour_of_day: usize,
    /// Length of the slice in hours, in `(0, 1]`.
    pub hours: f64,
}

impl HourSlice {
    /// The bucket this slice belongs to, if it is inside the current week.
    #[must_use]
    pub fn bucket(&self) -> Option<usize> {
        (self.hour_of_week < HOURS_PER_WEEK).then_some(self.hour_of_week)
    }
}

/// Iterator over the hour slices of `[start, start + duration)`, both in seconds since
/// Monday 00:00.
#[derive(Debug, Clone)]
pub struct HourSplit {
    cursor: f64,
    end: f64,
}

impl Iterator for HourSplit {
    type Item = HourSlice;

    fn next(&mut self) -> Option<HourSlice> {
        if self.cursor >= self.end {
            return None;
        }
        let hour = (self.cursor / SECONDS_PER_HOUR).floor();
        let boundary = (hour + 1.0) * SECONDS_PER_HOUR;
        let slice_end = boundary.min(self.end);
        if slice_end <= self.cursor {
            // Only reachable through floating point exhaustion of a huge time value.
            self.cursor = self.end;
            return None;
        }
        let hours = (slice_end - self.cursor) / SECONDS_PER_HOUR;
        self.cursor = slice_end;

        let hour_of_week = hour as usize;
        Some(HourSlice {
            hour_of_week,
            hour_of_day: hour_of_week % HOURS_PER_DAY,
            hours,
        })
    }
}

#[must_use]
pub fn split_by_hour(start_week_seconds: f64, duration_seconds: f64) -> HourSplit {
    let start = start_week_seconds.max(0.0);
    let duration = if duration_seconds.is_finite() { duration_seconds.max(0.0) } else { 0.0 };
    HourSplit {
        cursor: start,
        end: start + duration,
    }
}

/// Whether `hour_of_day` falls into the window `[start, end)`, which may wrap midnight.
#[must_use]
pub fn is_in_window(hour_of_day: usize, start: usize, end: usize) -> bool {
    if start <= end {
        (start..end).contains(&hour_of_day)
    } else {
        hour_of_day >= start || hour_of_day < end
    }
}

/// 168 accumulators, one per hour of the week. Writes are increments only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyBuckets(Vec<f64>);

impl Default for WeeklyBuckets {
    fn default() -> Self {
        WeeklyBuckets(vec![0.0; HOURS_PER_WEEK])
    }
}

impl WeeklyBuckets {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value` to `hour_of_week`. Returns `false` (and does nothing) when the bucket
    /// lies past the end of the week.
    pub fn add(&mut self, hour_of_week: usize, value: f64) -> bool {
        match self.0.get_mut(hour_of_week) {
            Some(bucket) => {
                *bucket += value;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn get(&self, hour_of_week: usize) -> f64 {
        self.0.get(hour_of_week).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.0.iter().copied()
    }

    #[must_use]
    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}
