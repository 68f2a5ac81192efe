use crate::constants::*;
use crate::error::{ArchiverError, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use dashmap::DashMap;
use once_cell::sync::Lazy;

// Unix timestamp of Jan 1st 00:00:00 UTC, per calendar year
static YEAR_STARTS: Lazy<DashMap<i32, i64>> = Lazy::new(DashMap::new);

const NANOS_PER_SECOND: u32 = 1_000_000_000;

/// Formats a timestamp the way the archiver expects query bounds, with
/// millisecond precision and an explicit offset.
pub fn format_date_for_archiver(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, false)
}

/// Reverses the archiver's line escaping. The escape byte is followed by a
/// code: 0x01 for the escape byte itself, 0x02 for newline, 0x03 for carriage
/// return. Any other code is taken literally.
pub fn unescape_line(input: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        let b = input[i];
        if b == ESCAPE_CHAR {
            i += 1;
            if i >= input.len() {
                break;
            }
            match input[i] {
                ESCAPE_ESCAPE_CHAR => output.push(ESCAPE_CHAR),
                NEWLINE_ESCAPE_CHAR => output.push(NEWLINE_CHAR),
                CARRIAGERETURN_ESCAPE_CHAR => output.push(CARRIAGERETURN_CHAR),
                b => output.push(b),
            }
        } else {
            output.push(b);
        }
        i += 1;
    }
    output
}

pub fn year_start(year: i32) -> Result<i64> {
    if let Some(start) = YEAR_STARTS.get(&year) {
        return Ok(*start);
    }

    let start = NaiveDate::from_ymd_opt(year, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
        .ok_or(ArchiverError::FailedToParse)?;

    YEAR_STARTS.insert(year, start);
    Ok(start)
}

/// Timestamp of a sample given as seconds and nanoseconds into a year.
pub fn calc_time(year: i32, seconds_into_year: u32, nanos: u32) -> Result<DateTime<Utc>> {
    let secs = year_start(year)?
        + seconds_into_year as i64
        + (nanos / NANOS_PER_SECOND) as i64;

    DateTime::<Utc>::from_timestamp(secs, nanos % NANOS_PER_SECOND)
        .ok_or(ArchiverError::FailedToParse)
}
