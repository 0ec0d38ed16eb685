// src/timeframe.rs

use crate::config::MAX_HISTORY_YEARS;
use crate::error::UnknownConventionError;
use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use chrono_tz::Tz;
use std::fmt;
use std::str::FromStr;

/// Splits `"10y"` into `(10, "y")`. A missing number means 1.
fn split_count(raw: &str) -> Option<(u32, String)> {
    let raw = raw.trim().to_ascii_lowercase();
    let digits: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
    let unit = raw[digits.len()..].to_string();
    let count = if digits.is_empty() { 1 } else { digits.parse().ok()? };
    if count == 0 || unit.is_empty() {
        return None;
    }
    Some((count, unit))
}

/// Bar size unit as named in the aggregates API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timespan {
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

impl Timespan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timespan::Minute => "minute",
            Timespan::Hour => "hour",
            Timespan::Day => "day",
            Timespan::Week => "week",
            Timespan::Month => "month",
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            Timespan::Minute => "m",
            Timespan::Hour => "h",
            Timespan::Day => "d",
            Timespan::Week => "wk",
            Timespan::Month => "mo",
        }
    }
}

/// Bar interval such as `"1d"` or `"5m"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    pub multiplier: u32,
    pub timespan: Timespan,
}

impl Interval {
    pub const DAILY: Interval = Interval {
        multiplier: 1,
        timespan: Timespan::Day,
    };

    /// Calendar days covered by one request, keeping each response under
    /// the API result limit.
    pub fn window_days(&self) -> i64 {
        match self.timespan {
            Timespan::Minute => 1,
            Timespan::Hour => 60,
            Timespan::Day | Timespan::Week | Timespan::Month => 365 * 5,
        }
    }
}

impl FromStr for Interval {
    type Err = UnknownConventionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (multiplier, unit) = split_count(s).ok_or_else(|| UnknownConventionError::new("interval", s))?;
        let timespan = match unit.as_str() {
            "m" | "min" => Timespan::Minute,
            "h" => Timespan::Hour,
            "d" => Timespan::Day,
            "w" | "wk" => Timespan::Week,
            "mo" => Timespan::Month,
            _ => return Err(UnknownConventionError::new("interval", s)),
        };
        Ok(Interval { multiplier, timespan })
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.multiplier, self.timespan.suffix())
    }
}

/// Look-back window such as `"10y"`, `"6mo"` or `"max"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    Days(u32),
    Weeks(u32),
    Months(u32),
    Years(u32),
    Max,
}

impl Period {
    /// First calendar date covered when the window ends on `end`. Windows
    /// reaching past the calendar start at `NaiveDate::MIN`.
    pub fn start_from(&self, end: NaiveDate) -> NaiveDate {
        let start = match *self {
            Period::Days(n) => end.checked_sub_signed(Duration::days(n as i64)),
            Period::Weeks(n) => end.checked_sub_signed(Duration::weeks(n as i64)),
            Period::Months(n) => end.checked_sub_months(Months::new(n)),
            Period::Years(n) => n.checked_mul(12).and_then(|months| end.checked_sub_months(Months::new(months))),
            Period::Max => end.checked_sub_months(Months::new(MAX_HISTORY_YEARS * 12)),
        };
        start.unwrap_or(NaiveDate::MIN)
    }

    /// Timestamps strictly after the returned cutoff fall inside the window
    /// ending at `last_millis`. `None` keeps everything.
    pub fn cutoff_millis(&self, last_millis: i64) -> Option<i64> {
        if *self == Period::Max {
            return None;
        }
        let last = DateTime::<Utc>::from_timestamp_millis(last_millis)?;
        let end = last.date_naive();
        let span = end - self.start_from(end);
        Some(last_millis.saturating_sub(span.num_milliseconds()))
    }
}

impl FromStr for Period {
    type Err = UnknownConventionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("max") {
            return Ok(Period::Max);
        }
        let (count, unit) = split_count(s).ok_or_else(|| UnknownConventionError::new("period", s))?;
        match unit.as_str() {
            "d" => Ok(Period::Days(count)),
            "w" | "wk" => Ok(Period::Weeks(count)),
            "mo" => Ok(Period::Months(count)),
            "y" => Ok(Period::Years(count)),
            _ => Err(UnknownConventionError::new("period", s)),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Days(n) => write!(f, "{}d", n),
            Period::Weeks(n) => write!(f, "{}wk", n),
            Period::Months(n) => write!(f, "{}mo", n),
            Period::Years(n) => write!(f, "{}y", n),
            Period::Max => write!(f, "max"),
        }
    }
}

pub enum MarketTimezone {
    Eastern,
    // Additional market timezones can be added here
}

impl MarketTimezone {
    pub fn timezone(&self) -> Tz {
        match self {
            MarketTimezone::Eastern => chrono_tz::US::Eastern,
        }
    }

    /// Current trading date in the market's timezone.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone()).date_naive()
    }

    /// Market-local date of an epoch-millis timestamp.
    pub fn date_of(&self, millis: i64) -> Option<NaiveDate> {
        DateTime::<Utc>::from_timestamp_millis(millis)
            .map(|dt| dt.with_timezone(&self.timezone()).date_naive())
    }
}
