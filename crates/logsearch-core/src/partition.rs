//! Time-partition calculator.
//!
//! Maps a timestamp to the half-open UTC interval `[start, end)` of the
//! table partition that should hold it. Every calendar month is covered by
//! exactly four contiguous partitions: each spans `⌊D/4⌋` days (`D` = days
//! in the month) and the first `D mod 4` partitions are one day longer, so
//! partition lengths are always 7 or 8 days and partitions never straddle a
//! month boundary.
//!
//! The `YYYY_MM_DD` name suffix produced here is load-bearing: the retention
//! sweep drops the lexicographically smallest child first, which is the
//! chronologically oldest only because the suffix sorts that way.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};

/// Half-open UTC interval `[start, end)` covered by one table partition.
///
/// Both bounds are UTC midnights; `end - start` is 7 or 8 days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionInterval {
    /// Inclusive start, a UTC midnight.
    pub start: DateTime<Utc>,
    /// Exclusive end, a UTC midnight.
    pub end: DateTime<Utc>,
}

impl PartitionInterval {
    /// Returns the interval that holds `t`.
    ///
    /// `t` is normalised to the UTC calendar day it falls on; the result
    /// depends only on that day.
    #[must_use]
    pub fn containing(t: DateTime<Utc>) -> Self {
        let day = t.date_naive();
        let (year, month) = (day.year(), day.month());
        let days = days_in_month(year, month);
        let base = days / 4;
        let extended = days % 4;

        // Walk the four ranges until one contains the day of month. The
        // fourth range always ends at `days + 1`, i.e. the first of the
        // next month, so the walk cannot fall through.
        let mut start_day = 1;
        for range in 0..4 {
            let length = base + u32::from(range < extended);
            let next_start = start_day + length;
            if day.day() < next_start || range == 3 {
                return Self {
                    start: midnight(day_of_month(year, month, start_day, days)),
                    end: midnight(day_of_month(year, month, next_start, days)),
                };
            }
            start_day = next_start;
        }
        unreachable!("the fourth range covers the rest of the month");
    }

    /// Renders the `YYYY_MM_DD` partition-name suffix for this interval.
    #[must_use]
    pub fn suffix(&self) -> String {
        self.start.format("%Y_%m_%d").to_string()
    }

    /// Renders the full child-partition name for `parent`.
    #[must_use]
    pub fn child_name(&self, parent: &str) -> String {
        format!("{parent}_{}", self.suffix())
    }

    /// True when `t` falls inside `[start, end)`.
    #[must_use]
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }
}

/// Resolves a 1-based day number to a date, rolling `days + 1` over to the
/// first of the next month (the exclusive end of the last range).
fn day_of_month(year: i32, month: u32, day: u32, days: u32) -> NaiveDate {
    let (year, month, day) = if day > days {
        match month {
            12 => (year + 1, 1, 1),
            _ => (year, month + 1, 1),
        }
    } else {
        (year, month, day)
    };
    NaiveDate::from_ymd_opt(year, month, day).expect("day number validated against month length")
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        _ => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
    }
}

const fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}
