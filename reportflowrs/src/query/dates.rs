//! Date keyword expansion, datetime criteria normalization and bucket
//! arithmetic.
//!
//! Keyword ranges are closed intervals `[period start, next period start
//! - 1s]`, computed from an injected clock so compilation stays
//! deterministic.

use std::collections::HashMap;

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use once_cell::sync::Lazy;

use crate::error::{ReportflowError, Result};
use crate::schema::DateInterval;

/// Canonical form every datetime criteria is normalized to before
/// binding.
pub const SQL_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Relative period keywords accepted as DateInterval filter criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateKeyword {
    Today,
    Yesterday,
    ThisWeek,
    LastWeek,
    ThisMonth,
    LastMonth,
    ThisQuarter,
    LastQuarter,
    ThisYear,
    LastYear,
    ThisHour,
    ThisMinute,
    LastMinute,
}

static KEYWORDS: Lazy<HashMap<&'static str, DateKeyword>> = Lazy::new(|| {
    use DateKeyword::*;
    HashMap::from([
        ("today", Today),
        ("yesterday", Yesterday),
        ("thisweek", ThisWeek),
        ("lastweek", LastWeek),
        ("thismonth", ThisMonth),
        ("lastmonth", LastMonth),
        ("thisquarter", ThisQuarter),
        ("lastquarter", LastQuarter),
        ("thisyear", ThisYear),
        ("lastyear", LastYear),
        ("thishour", ThisHour),
        ("thisminute", ThisMinute),
        ("lastminute", LastMinute),
    ])
});

impl DateKeyword {
    /// Parse a criteria value. Case, spaces, underscores and dashes are
    /// ignored, so `ThisWeek`, `this week` and `THIS_WEEK` all match.
    pub fn parse(raw: &str) -> Option<Self> {
        let key: String = raw
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();
        KEYWORDS.get(key.as_str()).copied()
    }
}

/// Closed `[start, end]` range for a keyword relative to `now`.
pub fn keyword_range(
    keyword: DateKeyword,
    now: NaiveDateTime,
    week_start: Weekday,
) -> (NaiveDateTime, NaiveDateTime) {
    let today = now.date();
    match keyword {
        DateKeyword::Today => range_to(midnight(today), midnight(today + Duration::days(1))),
        DateKeyword::Yesterday => range_to(midnight(today - Duration::days(1)), midnight(today)),
        DateKeyword::ThisWeek => {
            let start = week_start_of(today, week_start);
            range_to(midnight(start), midnight(start + Duration::days(7)))
        }
        DateKeyword::LastWeek => {
            let start = week_start_of(today, week_start);
            range_to(midnight(start - Duration::days(7)), midnight(start))
        }
        DateKeyword::ThisMonth => {
            let start = month_start(today);
            range_to(midnight(start), midnight(add_months(start, 1)))
        }
        DateKeyword::LastMonth => {
            let start = month_start(today);
            range_to(midnight(sub_months(start, 1)), midnight(start))
        }
        DateKeyword::ThisQuarter => {
            let start = quarter_start(today);
            range_to(midnight(start), midnight(add_months(start, 3)))
        }
        DateKeyword::LastQuarter => {
            let start = quarter_start(today);
            range_to(midnight(sub_months(start, 3)), midnight(start))
        }
        DateKeyword::ThisYear => {
            let start = year_start(today);
            range_to(midnight(start), midnight(add_months(start, 12)))
        }
        DateKeyword::LastYear => {
            let start = year_start(today);
            range_to(midnight(sub_months(start, 12)), midnight(start))
        }
        DateKeyword::ThisHour => {
            let start = at_time(today, now.hour(), 0);
            range_to(start, start + Duration::hours(1))
        }
        DateKeyword::ThisMinute => {
            let start = at_time(today, now.hour(), now.minute());
            range_to(start, start + Duration::minutes(1))
        }
        DateKeyword::LastMinute => {
            let start = at_time(today, now.hour(), now.minute());
            range_to(start - Duration::minutes(1), start)
        }
    }
}

/// Parse a datetime criteria. Accepts the canonical form, ISO `T`
/// separators, date-only values and US-style slashes.
pub fn parse_datetime(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    for fmt in [
        SQL_DATETIME_FORMAT,
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%m/%d/%Y %H:%M:%S",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(dt);
        }
    }
    for fmt in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Ok(midnight(d));
        }
    }
    Err(ReportflowError::Sql(format!(
        "unparseable datetime criteria: {raw}"
    )))
}

/// Normalize a datetime criteria to [`SQL_DATETIME_FORMAT`].
pub fn normalize_datetime(raw: &str) -> Result<String> {
    Ok(format_datetime(parse_datetime(raw)?))
}

pub fn format_datetime(dt: NaiveDateTime) -> String {
    dt.format(SQL_DATETIME_FORMAT).to_string()
}

/// Truncate to the start of the containing bucket.
pub fn bucket_start(
    dt: NaiveDateTime,
    interval: DateInterval,
    week_start: Weekday,
) -> NaiveDateTime {
    let d = dt.date();
    match interval {
        DateInterval::Day => midnight(d),
        DateInterval::Week => midnight(week_start_of(d, week_start)),
        DateInterval::Month => midnight(month_start(d)),
        DateInterval::Quarter => midnight(quarter_start(d)),
        DateInterval::Year => midnight(year_start(d)),
    }
}

/// Start of the bucket after the one beginning at `start`.
pub fn next_bucket(start: NaiveDateTime, interval: DateInterval) -> NaiveDateTime {
    let d = start.date();
    match interval {
        DateInterval::Day => midnight(d + Duration::days(1)),
        DateInterval::Week => midnight(d + Duration::days(7)),
        DateInterval::Month => midnight(add_months(d, 1)),
        DateInterval::Quarter => midnight(add_months(d, 3)),
        DateInterval::Year => midnight(add_months(d, 12)),
    }
}

fn midnight(d: NaiveDate) -> NaiveDateTime {
    d.and_time(NaiveTime::MIN)
}

fn at_time(d: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    d.and_time(NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN))
}

fn range_to(start: NaiveDateTime, next: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
    (start, next - Duration::seconds(1))
}

fn week_start_of(d: NaiveDate, week_start: Weekday) -> NaiveDate {
    d.week(week_start).first_day()
}

fn month_start(d: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(d.year(), d.month(), 1).unwrap_or(d)
}

fn quarter_start(d: NaiveDate) -> NaiveDate {
    let month = (d.month0() / 3) * 3 + 1;
    NaiveDate::from_ymd_opt(d.year(), month, 1).unwrap_or(d)
}

fn year_start(d: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(d.year(), 1, 1).unwrap_or(d)
}

fn add_months(d: NaiveDate, n: u32) -> NaiveDate {
    d.checked_add_months(Months::new(n)).unwrap_or(d)
}

fn sub_months(d: NaiveDate, n: u32) -> NaiveDate {
    d.checked_sub_months(Months::new(n)).unwrap_or(d)
}
