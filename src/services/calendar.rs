//! Work calendar arithmetic.
//!
//! A work day is any date that is neither a weekend (Saturday/Sunday) nor
//! in the holiday set.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, Weekday};

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

pub fn is_working_day(date: NaiveDate, holidays: &BTreeSet<NaiveDate>) -> bool {
    !is_weekend(date) && !holidays.contains(&date)
}

/// The day after `date`. Dates in planning ranges stay far from the
/// calendar's representable bounds.
pub fn next_day(date: NaiveDate) -> NaiveDate {
    date.succ_opt().expect("date arithmetic overflow")
}

/// First working day at or after `date`.
pub fn next_working_day(mut date: NaiveDate, holidays: &BTreeSet<NaiveDate>) -> NaiveDate {
    while !is_working_day(date, holidays) {
        date = next_day(date);
    }
    date
}

/// Count working days in `[start, end]` inclusive.
pub fn count_working_days(
    start: NaiveDate,
    end: NaiveDate,
    holidays: &BTreeSet<NaiveDate>,
) -> u32 {
    let mut date = start;
    let mut count = 0;
    while date <= end {
        if is_working_day(date, holidays) {
            count += 1;
        }
        date = next_day(date);
    }
    count
}

/// Ordered working days in `[start, end]` inclusive.
pub fn working_days(
    start: NaiveDate,
    end: NaiveDate,
    holidays: &BTreeSet<NaiveDate>,
) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut date = start;
    while date <= end {
        if is_working_day(date, holidays) {
            days.push(date);
        }
        date = next_day(date);
    }
    days
}
