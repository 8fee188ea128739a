//! Conversion of cell text into points in time.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;

/// Date-times carrying a UTC offset, converted to UTC.
const OFFSET_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%#z",
    "%Y-%m-%d %H:%M%#z",
];

/// `%.f` also matches a missing fraction.
const DATETIME_FORMATS: [&str; 14] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%d/%m/%Y %H:%M:%S%.f",
    "%d/%m/%Y %H:%M",
    "%d.%m.%Y %H:%M:%S%.f",
    "%d.%m.%Y %H:%M",
    "%d-%m-%Y %H:%M:%S%.f",
    "%d-%m-%Y %H:%M",
    "%Y%m%dT%H%M%S",
    "%Y%m%d %H%M%S",
];

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d.%m.%Y", "%d-%m-%Y"];

const TIME_FORMATS: [&str; 2] = ["%H:%M:%S%.f", "%H:%M"];

/// What to do with a timestamp cell that cannot be parsed.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, EnumString, Eq, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BadTimestamp {
    /// Fail the whole run; nothing is written.
    #[default]
    Abort,
    /// Keep the row with an empty timestamp, sorted after all valid ones.
    Null,
    /// Remove the row from the output.
    Drop,
}

/// Unit of plain numbers found in a timestamp column, counted from the Unix
/// epoch.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, EnumString, Eq, PartialEq, Serialize,
)]
pub enum EpochUnit {
    #[default]
    #[serde(rename = "s")]
    #[strum(serialize = "s")]
    Seconds,
    #[serde(rename = "ms")]
    #[strum(serialize = "ms")]
    Milliseconds,
    #[serde(rename = "us")]
    #[strum(serialize = "us")]
    Microseconds,
    #[serde(rename = "ns")]
    #[strum(serialize = "ns")]
    Nanoseconds,
}

impl EpochUnit {
    fn millis_per_unit(self) -> f64 {
        match self {
            Self::Seconds => 1_000.0,
            Self::Milliseconds => 1.0,
            Self::Microseconds => 1e-3,
            Self::Nanoseconds => 1e-6,
        }
    }
}

#[derive(Debug, Eq, Error, PartialEq)]
#[error("unrecognized timestamp \"{0}\"")]
pub struct ParseError(String);

/// Parses cell text into milliseconds since the Unix epoch (UTC).
#[derive(Clone, Copy, Debug, Default)]
pub struct TimestampParser {
    epoch_unit: EpochUnit,
}

impl TimestampParser {
    #[must_use]
    pub fn new(epoch_unit: EpochUnit) -> Self {
        Self { epoch_unit }
    }

    /// Parses `value`, trying offset-aware forms first, then naive date-times,
    /// dates, times of day and finally plain numbers.
    ///
    /// A time of day without a date is placed on 1970-01-01.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` matches none of the accepted forms or lies
    /// outside the representable range.
    pub fn parse_millis(&self, value: &str) -> Result<i64, ParseError> {
        let s = value.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.timestamp_millis());
        }
        for fmt in OFFSET_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
                return Ok(dt.timestamp_millis());
            }
        }
        for fmt in DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Ok(dt.and_utc().timestamp_millis());
            }
        }
        for fmt in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
                return Ok(date.and_time(NaiveTime::MIN).and_utc().timestamp_millis());
            }
        }
        for fmt in TIME_FORMATS {
            if let Ok(time) = NaiveTime::parse_from_str(s, fmt) {
                return Ok(i64::from(time.num_seconds_from_midnight()) * 1_000
                    + i64::from(time.nanosecond() / 1_000_000));
            }
        }
        s.parse::<f64>()
            .ok()
            .and_then(|n| self.from_epoch(n))
            .ok_or_else(|| ParseError(value.to_string()))
    }

    fn from_epoch(&self, n: f64) -> Option<i64> {
        let millis = (n * self.epoch_unit.millis_per_unit()).round().to_i64()?;
        DateTime::from_timestamp_millis(millis).map(|_| millis)
    }
}

/// Formats milliseconds since the Unix epoch as `YYYY-MM-DD HH:MM:SS`,
/// appending `.fff` only for a non-zero sub-second part.
#[must_use]
pub fn format_millis(millis: i64) -> Option<String> {
    DateTime::from_timestamp_millis(millis).map(|dt| format_naive(&dt.naive_utc()))
}

#[must_use]
pub fn format_naive(dt: &NaiveDateTime) -> String {
    if dt.nanosecond() == 0 {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
    }
}

/// Rounds to the nearest millisecond, absorbing the float noise of
/// spreadsheet serial dates.
pub(crate) fn round_to_millis(dt: NaiveDateTime) -> NaiveDateTime {
    let micros = dt.and_utc().timestamp_micros();
    DateTime::from_timestamp_millis((micros + 500).div_euclid(1_000)).map_or(dt, |r| r.naive_utc())
}
