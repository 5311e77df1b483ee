//! Timestamp prefix parsing.
//!
//! Game-server lines start with a day/month/year stamp in one of several
//! shapes, for example `(1/2/2026 10:00)`, `[01.02.26 10:00:15]` or
//! `1-2-2,026 10:00 -`. The wall-clock fields are handed to an injected
//! [`TimestampFn`], which owns the timezone policy.

use std::sync::{Arc, LazyLock};

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use regex_lite::Regex;

use crate::types::Timestamp;

/// Builds a timezone-aware timestamp from the wall-clock fields of a log
/// line. Returns `None` when the local time does not exist in the target
/// timezone.
pub type TimestampFn = Arc<dyn Fn(NaiveDateTime) -> Option<Timestamp> + Send + Sync>;

static PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[(\[]?(\d{1,2})[/.\-](\d{1,2})[/.\-](\d,?\d{3}|\d{2})[\sT,]+(\d{1,2}):(\d{2})(?::(\d{2}))?[)\]]?\s*(?:[:\-]\s*)?",
    )
    .expect("timestamp prefix pattern is valid")
});

/// Interprets log wall-clock times in a fixed UTC offset.
#[must_use]
pub fn fixed_offset(offset: FixedOffset) -> TimestampFn {
    Arc::new(move |naive| offset.from_local_datetime(&naive).single())
}

/// Splits a line into its parsed timestamp and the remaining body.
///
/// Returns `None` if the line has no recognisable timestamp prefix or the
/// fields do not form a valid date and time.
pub fn split_timestamp<'a>(line: &'a str, build: &TimestampFn) -> Option<(Timestamp, &'a str)> {
    let caps = PREFIX.captures(line)?;
    let whole = caps.get(0)?;

    let day: u32 = caps.get(1)?.as_str().parse().ok()?;
    let month: u32 = caps.get(2)?.as_str().parse().ok()?;
    let year_digits = caps.get(3)?.as_str().replace(',', "");
    let mut year: i32 = year_digits.parse().ok()?;
    if year_digits.len() == 2 {
        year += 2000;
    }
    let hour: u32 = caps.get(4)?.as_str().parse().ok()?;
    let minute: u32 = caps.get(5)?.as_str().parse().ok()?;
    let second: u32 = match caps.get(6) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    let timestamp = build(naive)?;

    Some((timestamp, line[whole.end()..].trim()))
}
