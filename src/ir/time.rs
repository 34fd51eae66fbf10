//! Time ranges and the closed vocabulary of relative windows.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Whether a [`TimeRange`] value is a named window or an explicit interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRangeKind {
    Relative,
    Absolute,
}

/// Time range as carried in the IR.
///
/// `value` is a [`RelativeWindow`] name for relative ranges, or an inclusive
/// `YYYY-MM-DD/YYYY-MM-DD` interval for absolute ones. It is validated by the
/// resolver, not on deserialization, so a bad value becomes a clarification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(rename = "type")]
    pub kind: TimeRangeKind,
    pub value: String,
}

impl TimeRange {
    pub fn relative(value: impl Into<String>) -> Self {
        Self {
            kind: TimeRangeKind::Relative,
            value: value.into(),
        }
    }

    /// Inclusive interval from `start` to `end`.
    pub fn absolute(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            kind: TimeRangeKind::Absolute,
            value: format!("{}/{}", start, end),
        }
    }

    /// Interpret the value.
    pub fn window(&self) -> Result<TimeWindow, TimeRangeError> {
        match self.kind {
            TimeRangeKind::Relative => self.value.parse().map(TimeWindow::Relative),
            TimeRangeKind::Absolute => parse_absolute(&self.value),
        }
    }
}

/// Why a time range value could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeRangeError {
    #[error("'{0}' is not a recognised relative window")]
    UnknownRelative(String),

    #[error("'{0}' is not a YYYY-MM-DD/YYYY-MM-DD interval")]
    MalformedAbsolute(String),

    #[error("'{0}' is not a valid calendar date")]
    InvalidDate(String),

    #[error("interval starts on {start} after it ends on {end}")]
    Reversed { start: NaiveDate, end: NaiveDate },

    #[error("window '{window}' anchored on {anchor} falls outside the supported calendar")]
    OutOfRange { window: String, anchor: NaiveDate },
}

/// Half-open `[start, end)` date bounds.
pub type DateBounds = (NaiveDate, NaiveDate);

fn parse_absolute(value: &str) -> Result<TimeWindow, TimeRangeError> {
    let (start, end) = value
        .split_once('/')
        .ok_or_else(|| TimeRangeError::MalformedAbsolute(value.to_string()))?;
    let start = parse_date(start)?;
    let end = parse_date(end)?;
    if start > end {
        return Err(TimeRangeError::Reversed { start, end });
    }
    Ok(TimeWindow::Absolute { start, end })
}

fn parse_date(s: &str) -> Result<NaiveDate, TimeRangeError> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| TimeRangeError::InvalidDate(s.to_string()))
}

/// Named windows relative to the anchor date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelativeWindow {
    Today,
    Yesterday,
    Last7Days,
    Last14Days,
    Last30Days,
    Last90Days,
    ThisMonth,
    LastMonth,
    AllTime,
}

impl RelativeWindow {
    pub const ALL: [RelativeWindow; 9] = [
        RelativeWindow::Today,
        RelativeWindow::Yesterday,
        RelativeWindow::Last7Days,
        RelativeWindow::Last14Days,
        RelativeWindow::Last30Days,
        RelativeWindow::Last90Days,
        RelativeWindow::ThisMonth,
        RelativeWindow::LastMonth,
        RelativeWindow::AllTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelativeWindow::Today => "today",
            RelativeWindow::Yesterday => "yesterday",
            RelativeWindow::Last7Days => "last_7_days",
            RelativeWindow::Last14Days => "last_14_days",
            RelativeWindow::Last30Days => "last_30_days",
            RelativeWindow::Last90Days => "last_90_days",
            RelativeWindow::ThisMonth => "this_month",
            RelativeWindow::LastMonth => "last_month",
            RelativeWindow::AllTime => "all_time",
        }
    }

    /// Window covering the `n` full days before the anchor, if one exists.
    pub fn last_n_days(n: u32) -> Option<Self> {
        match n {
            1 => Some(RelativeWindow::Yesterday),
            7 => Some(RelativeWindow::Last7Days),
            14 => Some(RelativeWindow::Last14Days),
            30 => Some(RelativeWindow::Last30Days),
            90 => Some(RelativeWindow::Last90Days),
            _ => None,
        }
    }

    /// Human-readable phrase used in explanations.
    pub fn describe(&self) -> &'static str {
        match self {
            RelativeWindow::Today => "today",
            RelativeWindow::Yesterday => "yesterday",
            RelativeWindow::Last7Days => "the last 7 days",
            RelativeWindow::Last14Days => "the last 14 days",
            RelativeWindow::Last30Days => "the last 30 days",
            RelativeWindow::Last90Days => "the last 90 days",
            RelativeWindow::ThisMonth => "this month to date",
            RelativeWindow::LastMonth => "last month",
            RelativeWindow::AllTime => "all time",
        }
    }

    /// Half-open `[start, end)` bounds for `anchor`; `None` for all time.
    ///
    /// Fails when a bound would fall before or after the representable
    /// calendar.
    pub fn bounds(&self, anchor: NaiveDate) -> Result<Option<DateBounds>, TimeRangeError> {
        let shift = |date: NaiveDate, days: i64| {
            date.checked_add_signed(Duration::days(days))
                .ok_or_else(|| TimeRangeError::OutOfRange {
                    window: self.to_string(),
                    anchor,
                })
        };
        let bounds = match self {
            RelativeWindow::Today => (anchor, shift(anchor, 1)?),
            RelativeWindow::Yesterday => (shift(anchor, -1)?, anchor),
            RelativeWindow::Last7Days => (shift(anchor, -7)?, anchor),
            RelativeWindow::Last14Days => (shift(anchor, -14)?, anchor),
            RelativeWindow::Last30Days => (shift(anchor, -30)?, anchor),
            RelativeWindow::Last90Days => (shift(anchor, -90)?, anchor),
            RelativeWindow::ThisMonth => (month_start(anchor), shift(anchor, 1)?),
            RelativeWindow::LastMonth => {
                let this_month = month_start(anchor);
                (month_start(shift(this_month, -1)?), this_month)
            }
            RelativeWindow::AllTime => return Ok(None),
        };
        Ok(Some(bounds))
    }
}

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

impl FromStr for RelativeWindow {
    type Err = TimeRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        RelativeWindow::ALL
            .into_iter()
            .find(|w| w.as_str() == normalized)
            .ok_or_else(|| TimeRangeError::UnknownRelative(s.to_string()))
    }
}

impl fmt::Display for RelativeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeWindow {
    Relative(RelativeWindow),
    /// Inclusive on both ends.
    Absolute { start: NaiveDate, end: NaiveDate },
}

impl TimeWindow {
    pub fn is_all_time(&self) -> bool {
        matches!(self, TimeWindow::Relative(RelativeWindow::AllTime))
    }

    /// Half-open `[start, end)` bounds for `anchor`; `None` for all time.
    pub fn bounds(&self, anchor: NaiveDate) -> Result<Option<DateBounds>, TimeRangeError> {
        match self {
            TimeWindow::Relative(w) => w.bounds(anchor),
            TimeWindow::Absolute { start, end } => {
                let after = end.succ_opt().ok_or_else(|| TimeRangeError::OutOfRange {
                    window: format!("{}/{}", start, end),
                    anchor,
                })?;
                Ok(Some((*start, after)))
            }
        }
    }
}
