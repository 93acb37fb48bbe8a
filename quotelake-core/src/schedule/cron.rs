//! Five-field cron expressions (`minute hour day-of-month month day-of-week`).
//!
//! Each field accepts `*`, a value, a range `a-b`, a step `*/n` or `a-b/n`,
//! and comma-separated lists of those. Day-of-week runs 0–7 with both 0 and
//! 7 meaning Sunday. When both day fields are restricted, a time matches if
//! either one does (classic cron semantics). Times are evaluated as given;
//! the transformation schedule treats them as UTC.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid cron expression '{expr}': {reason}")]
pub struct CronError {
    pub expr: String,
    pub reason: String,
}

/// Search horizon for `next_after`; covers leap-day-only schedules.
const MAX_SEARCH_DAYS: i64 = 366 * 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CronExpr {
    source: String,
    minutes: u64,
    hours: u64,
    days_of_month: u64,
    months: u64,
    days_of_week: u64,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl CronExpr {
    pub fn parse(expr: &str) -> Result<Self, CronError> {
        let err = |reason: String| CronError {
            expr: expr.to_string(),
            reason,
        };

        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(err(format!("expected 5 fields, found {}", fields.len())));
        }

        let minutes = parse_field(fields[0], 0, 59).map_err(&err)?;
        let hours = parse_field(fields[1], 0, 23).map_err(&err)?;
        let days_of_month = parse_field(fields[2], 1, 31).map_err(&err)?;
        let months = parse_field(fields[3], 1, 12).map_err(&err)?;
        let mut days_of_week = parse_field(fields[4], 0, 7).map_err(&err)?;
        if days_of_week & (1 << 7) != 0 {
            days_of_week = (days_of_week & !(1 << 7)) | 1;
        }

        Ok(Self {
            source: fields.join(" "),
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week,
            dom_restricted: !fields[2].starts_with('*'),
            dow_restricted: !fields[4].starts_with('*'),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the schedule fires at this minute.
    pub fn matches(&self, at: NaiveDateTime) -> bool {
        bit(self.minutes, at.minute())
            && bit(self.hours, at.hour())
            && self.matches_date(at.date())
    }

    /// First firing time strictly after `after`.
    pub fn next_after(&self, after: NaiveDateTime) -> Option<NaiveDateTime> {
        let start = after.with_second(0)?.with_nanosecond(0)? + Duration::minutes(1);
        let mut date = start.date();
        let last_date = date + Duration::days(MAX_SEARCH_DAYS);

        while date <= last_date {
            if self.matches_date(date) {
                let from = if date == start.date() {
                    start.time()
                } else {
                    NaiveTime::MIN
                };
                if let Some(time) = self.first_time_from(from) {
                    return Some(date.and_time(time));
                }
            }
            date = date.succ_opt()?;
        }
        None
    }

    /// Every firing time in `[from, to)`.
    pub fn occurrences(&self, from: NaiveDateTime, to: NaiveDateTime) -> Vec<NaiveDateTime> {
        let mut out = Vec::new();
        let Some(minute) = from.with_second(0).and_then(|t| t.with_nanosecond(0)) else {
            return out;
        };
        // A partial minute has already started, so its firing time is before `from`.
        let mut cursor = if minute == from {
            match minute.checked_sub_signed(Duration::minutes(1)) {
                Some(c) => c,
                None => return out,
            }
        } else {
            minute
        };
        while let Some(next) = self.next_after(cursor) {
            if next >= to {
                break;
            }
            out.push(next);
            cursor = next;
        }
        out
    }

    fn matches_date(&self, date: NaiveDate) -> bool {
        if !bit(self.months, date.month()) {
            return false;
        }
        let dom = bit(self.days_of_month, date.day());
        let dow = bit(self.days_of_week, date.weekday().num_days_from_sunday());
        match (self.dom_restricted, self.dow_restricted) {
            (true, true) => dom || dow,
            (true, false) => dom,
            (false, true) => dow,
            (false, false) => true,
        }
    }

    fn first_time_from(&self, from: NaiveTime) -> Option<NaiveTime> {
        for hour in from.hour()..24 {
            if !bit(self.hours, hour) {
                continue;
            }
            let first_minute = if hour == from.hour() { from.minute() } else { 0 };
            for minute in first_minute..60 {
                if bit(self.minutes, minute) {
                    return NaiveTime::from_hms_opt(hour, minute, 0);
                }
            }
        }
        None
    }
}

impl fmt::Display for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for CronExpr {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CronExpr {
    type Error = CronError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CronExpr> for String {
    fn from(expr: CronExpr) -> Self {
        expr.source
    }
}

fn bit(mask: u64, value: u32) -> bool {
    value < 64 && mask & (1u64 << value) != 0
}

fn parse_field(field: &str, min: u32, max: u32) -> Result<u64, String> {
    let mut mask = 0u64;
    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("bad step '{step}' in '{item}'"))?;
                if step == 0 {
                    return Err(format!("step must be positive in '{item}'"));
                }
                (range, step)
            }
            None => (item, 1),
        };

        let (lo, hi) = if range == "*" {
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            (parse_value(a, min, max)?, parse_value(b, min, max)?)
        } else {
            let v = parse_value(range, min, max)?;
            // `a/n` means "from a to the end of the field, every n"
            if step > 1 {
                (v, max)
            } else {
                (v, v)
            }
        };

        if lo > hi {
            return Err(format!("range {lo}-{hi} is reversed"));
        }

        let mut v = lo;
        while v <= hi {
            mask |= 1 << v;
            v += step;
        }
    }
    Ok(mask)
}

fn parse_value(raw: &str, min: u32, max: u32) -> Result<u32, String> {
    let v: u32 = raw.parse().map_err(|_| format!("'{raw}' is not a number"))?;
    if v < min || v > max {
        return Err(format!("{v} outside {min}-{max}"));
    }
    Ok(v)
}
