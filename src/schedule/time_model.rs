use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MINUTES_PER_HOUR: u32 = 60;
pub const MINUTES_PER_DAY: u32 = 24 * MINUTES_PER_HOUR;

/// Latest representable end of a class on the grid.
pub const DAY_END: ClockTime = ClockTime(MINUTES_PER_DAY - 1);

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TimeParseError {
    #[error("Malformed time '{0}', expected HH:MM")]
    Malformed(String),
    #[error("Time out of range: {0}")]
    OutOfRange(String),
}

/// Minute offset from midnight.
///
/// Values past `24:00` only exist as the unclamped result of
/// [`shift_preserving_duration`]; every stored event time is below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(u32);

impl ClockTime {
    pub fn from_minutes(minutes: u32) -> Self {
        Self(minutes)
    }

    pub fn from_hm(hour: u32, minute: u32) -> Self {
        Self(hour * MINUTES_PER_HOUR + minute)
    }

    pub fn parse(input: &str) -> Result<Self, TimeParseError> {
        to_minutes(input).map(Self)
    }

    pub fn minutes(&self) -> u32 {
        self.0
    }

    pub fn hour(&self) -> u32 {
        self.0 / MINUTES_PER_HOUR
    }

    pub fn minute(&self) -> u32 {
        self.0 % MINUTES_PER_HOUR
    }

    pub fn is_within_day(&self) -> bool {
        self.0 < MINUTES_PER_DAY
    }

    /// `HH:MM:SS` with a literal `:00`, as the backend expects.
    pub fn to_wire(&self) -> String {
        format!("{:02}:{:02}:00", self.hour(), self.minute())
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for ClockTime {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ClockTime {
    type Error = TimeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ClockTime> for String {
    fn from(time: ClockTime) -> Self {
        time.to_string()
    }
}

/// Parses `HH:MM` (or wire-format `HH:MM:SS`, seconds ignored) into minutes.
pub fn to_minutes(input: &str) -> Result<u32, TimeParseError> {
    static TIME_RE: OnceLock<Regex> = OnceLock::new();
    let pattern = TIME_RE.get_or_init(|| {
        Regex::new(r"^(\d{1,2}):(\d{2})(?::(\d{2}))?$").expect("invalid time regex")
    });

    let trimmed = input.trim();
    let caps = pattern
        .captures(trimmed)
        .ok_or_else(|| TimeParseError::Malformed(input.to_string()))?;

    let hours: u32 = caps[1]
        .parse()
        .map_err(|_| TimeParseError::Malformed(input.to_string()))?;
    let minutes: u32 = caps[2]
        .parse()
        .map_err(|_| TimeParseError::Malformed(input.to_string()))?;
    let seconds: u32 = match caps.get(3) {
        Some(s) => s
            .as_str()
            .parse()
            .map_err(|_| TimeParseError::Malformed(input.to_string()))?,
        None => 0,
    };

    if hours > 23 || minutes > 59 || seconds > 59 {
        return Err(TimeParseError::OutOfRange(input.to_string()));
    }

    Ok(hours * MINUTES_PER_HOUR + minutes)
}

/// New end time keeping `old_end - old_start`. Not clamped.
pub fn shift_preserving_duration(
    old_start: ClockTime,
    old_end: ClockTime,
    new_start: ClockTime,
) -> ClockTime {
    let duration = old_end.minutes().saturating_sub(old_start.minutes());
    ClockTime(new_start.minutes() + duration)
}

pub fn clamp_to_day_end(time: ClockTime) -> ClockTime {
    if time.hour() >= 24 { DAY_END } else { time }
}

/// Vertical offset of `event_start` inside the hour cell starting at
/// `hour_bucket_start`, as a percentage of the cell height.
pub fn offset_within_hour(event_start: ClockTime, hour_bucket_start: ClockTime) -> f64 {
    let delta = event_start.minutes() as f64 - hour_bucket_start.minutes() as f64;
    delta / MINUTES_PER_HOUR as f64 * 100.0
}

/// Card height as a percentage of one hour cell.
pub fn height_for_duration(start: ClockTime, end: ClockTime) -> f64 {
    let delta = end.minutes() as f64 - start.minutes() as f64;
    delta / MINUTES_PER_HOUR as f64 * 100.0
}
