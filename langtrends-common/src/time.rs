//! Calendar-month utilities
//!
//! Every score date is the first day of a month in UTC. These helpers keep that
//! alignment when walking the timeline.

use crate::{Error, Result};
use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};

/// Date format used in every persisted artifact (`YYYY-MM-DD`)
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// First day of the month containing `instant`, evaluated in UTC
///
/// A local time of 2024-03-31 23:30 at UTC-1 is already 2024-04-01 in UTC and
/// yields 2024-04-01.
pub fn first_day_of_month_utc(instant: DateTime<Utc>) -> NaiveDate {
    first_of_month(instant.date_naive())
}

/// First day of the current month in UTC
pub fn first_day_of_current_month() -> NaiveDate {
    first_day_of_month_utc(now())
}

/// Truncate a date to the first day of its month
pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn is_first_of_month(date: NaiveDate) -> bool {
    date.day() == 1
}

pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date + Months::new(months)
}

pub fn subtract_months(date: NaiveDate, months: u32) -> NaiveDate {
    date - Months::new(months)
}

/// Whole calendar months between two dates, ignoring order
pub fn months_between(a: NaiveDate, b: NaiveDate) -> u32 {
    let index = |d: NaiveDate| d.year() * 12 + d.month0() as i32;
    (index(a) - index(b)).unsigned_abs()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|e| Error::InvalidInput(format!("Invalid date '{}': {}", value, e)))
}

/// Parse a `YYYY-MM-DD` date that must fall on the first of a month
pub fn parse_month(value: &str) -> Result<NaiveDate> {
    let date = parse_date(value)?;
    if !is_first_of_month(date) {
        return Err(Error::InvalidInput(format!(
            "Date '{}' is not the first day of a month",
            value
        )));
    }
    Ok(date)
}
