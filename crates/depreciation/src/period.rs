//! Calendar-month period keys.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use assetbook_core::DomainError;

/// A calendar month. Ordered chronologically.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeriodKey {
    year: i32,
    month: u32,
}

// Keeps `first_day` total: chrono's NaiveDate covers roughly +/-262_000 years.
const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9999;

impl PeriodKey {
    pub fn new(year: i32, month: u32) -> Result<Self, DomainError> {
        if !(1..=12).contains(&month) {
            return Err(DomainError::validation(format!("month out of range: {month}")));
        }
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(DomainError::validation(format!("year out of range: {year}")));
        }
        Ok(Self { year, month })
    }

    /// The month containing `date`.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .expect("PeriodKey always holds a valid year and month")
    }

    /// Last calendar day of the month; used as a record's period date.
    pub fn end_date(&self) -> NaiveDate {
        self.next()
            .first_day()
            .pred_opt()
            .expect("first day of a month always has a predecessor")
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    pub fn prev(&self) -> Self {
        if self.month == 1 {
            Self { year: self.year - 1, month: 12 }
        } else {
            Self { year: self.year, month: self.month - 1 }
        }
    }

    /// Signed number of months from `self` to `other`.
    pub fn months_until(&self, other: PeriodKey) -> i64 {
        let from = self.year as i64 * 12 + (self.month as i64 - 1);
        let to = other.year as i64 * 12 + (other.month as i64 - 1);
        to - from
    }
}

impl core::fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl core::str::FromStr for PeriodKey {
    type Err = DomainError;

    /// Accepts `YYYY-MM` or any `YYYY-MM-DD` date inside the month.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(PeriodKey::of(date));
        }
        let (y, m) = s
            .split_once('-')
            .ok_or_else(|| DomainError::validation(format!("invalid period '{s}'")))?;
        let year = y
            .parse::<i32>()
            .map_err(|_| DomainError::validation(format!("invalid period year '{y}'")))?;
        let month = m
            .parse::<u32>()
            .map_err(|_| DomainError::validation(format!("invalid period month '{m}'")))?;
        PeriodKey::new(year, month)
    }
}

impl TryFrom<String> for PeriodKey {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PeriodKey> for String {
    fn from(value: PeriodKey) -> Self {
        value.to_string()
    }
}
