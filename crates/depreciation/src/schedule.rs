//! Period enumeration.
//!
//! The first depreciable period is the calendar month *after* the month of the
//! depreciation start date; a time-based schedule never runs past
//! `useful_life_months` periods from there.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::error::SkipReason;
use crate::period::PeriodKey;

/// First period charged for an asset whose service starts on `start`.
pub fn first_period(start: NaiveDate) -> PeriodKey {
    PeriodKey::of(start).next()
}

/// All periods from the first period through `through` (inclusive), capped at
/// `life_months` periods. Ascending.
pub fn enumerate_periods(start: NaiveDate, through: PeriodKey, life_months: u32) -> Vec<PeriodKey> {
    let first = first_period(start);
    let span = first.months_until(through) + 1;
    if span <= 0 {
        return Vec::new();
    }
    let count = span.min(i64::from(life_months)) as usize;

    let mut periods = Vec::with_capacity(count);
    let mut current = first;
    for _ in 0..count {
        periods.push(current);
        current = current.next();
    }
    periods
}

/// Periods of the schedule window through `target` that have no record yet,
/// ascending. Records outside the window (left over from an earlier start
/// date) neither fill nor shrink it.
pub fn enumerate_missing_periods(
    start: NaiveDate,
    target: PeriodKey,
    existing: &BTreeSet<PeriodKey>,
    life_months: u32,
) -> Vec<PeriodKey> {
    enumerate_periods(start, target, life_months)
        .into_iter()
        .filter(|p| !existing.contains(p))
        .collect()
}

/// Usage-based assets process exactly the target period, once.
pub fn usage_period(target: PeriodKey, existing: &BTreeSet<PeriodKey>) -> Result<PeriodKey, SkipReason> {
    if existing.contains(&target) {
        return Err(SkipReason::DuplicatePeriod(target));
    }
    Ok(target)
}
