//! Timestamps and campus wall-clock time
//!
//! Decisions are made against physical time (`Timestamp`, Unix milliseconds)
//! supplied through `PhysicalTimeEffects`. Weekday and time-of-day rules are
//! evaluated in the campus wall clock, which is a fixed UTC offset from
//! configuration.

use chrono::{DateTime, Datelike, FixedOffset, Offset, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::errors::{GateError, Result};

const MINUTES_PER_DAY: u16 = 24 * 60;

/// Physical time in Unix milliseconds
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Create from Unix milliseconds
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Create from Unix seconds
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1000))
    }

    /// Unix milliseconds
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Add a duration, saturating at the maximum timestamp
    pub fn saturating_add(self, duration: Duration) -> Self {
        Self(self.0.saturating_add(duration_ms(duration)))
    }

    /// Subtract a duration, saturating at the epoch
    pub fn saturating_sub(self, duration: Duration) -> Self {
        Self(self.0.saturating_sub(duration_ms(duration)))
    }

    /// Time elapsed since `earlier`; zero if `earlier` is in the future
    pub fn since(self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }

    /// Project onto the campus wall clock
    pub fn to_local(self, offset: UtcOffset) -> LocalMoment {
        let millis = i64::try_from(self.0).unwrap_or(i64::MAX);
        let utc = DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default();
        let local = utc.with_timezone(&offset.fixed());
        LocalMoment {
            day: DayOfWeek::from_chrono(local.weekday()),
            time: ClockTime::from_minutes_unchecked((local.hour() * 60 + local.minute()) as u16),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Fixed campus offset from UTC
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct UtcOffset {
    minutes: i32,
}

impl UtcOffset {
    /// Coordinated Universal Time
    pub const UTC: Self = Self { minutes: 0 };

    /// Create from an offset in minutes east of UTC (-1439..=1439)
    pub fn from_minutes(minutes: i32) -> Result<Self> {
        if minutes.abs() >= i32::from(MINUTES_PER_DAY) {
            return Err(GateError::invalid(format!(
                "utc offset {minutes} minutes is out of range"
            )));
        }
        Ok(Self { minutes })
    }

    /// Offset in minutes east of UTC
    pub fn minutes(&self) -> i32 {
        self.minutes
    }

    fn fixed(self) -> FixedOffset {
        FixedOffset::east_opt(self.minutes * 60).unwrap_or_else(|| Utc.fix())
    }
}

impl TryFrom<i32> for UtcOffset {
    type Error = GateError;

    fn try_from(minutes: i32) -> Result<Self> {
        Self::from_minutes(minutes)
    }
}

impl From<UtcOffset> for i32 {
    fn from(offset: UtcOffset) -> Self {
        offset.minutes
    }
}

/// Day of the week on the campus wall clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl DayOfWeek {
    /// All days, Sunday first
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Sunday,
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
    ];

    /// Monday through Friday
    pub const WORKDAYS: [DayOfWeek; 5] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
    ];

    /// Day number with Sunday = 0
    pub fn number_from_sunday(self) -> u8 {
        self as u8
    }

    /// Parse a day number with Sunday = 0
    pub fn from_number(n: u8) -> Result<Self> {
        Self::ALL
            .get(usize::from(n))
            .copied()
            .ok_or_else(|| GateError::invalid(format!("weekday {n} is out of range 0..=6")))
    }

    fn from_chrono(day: chrono::Weekday) -> Self {
        Self::ALL[day.num_days_from_sunday() as usize]
    }
}

/// Minutes since local midnight, written `HH:MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(u16);

impl ClockTime {
    /// Midnight
    pub const MIDNIGHT: Self = Self(0);

    /// Build from hour and minute
    pub fn new(hour: u8, minute: u8) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(GateError::invalid(format!(
                "{hour:02}:{minute:02} is not a valid clock time"
            )));
        }
        Ok(Self(u16::from(hour) * 60 + u16::from(minute)))
    }

    const fn from_minutes_unchecked(minutes: u16) -> Self {
        Self(minutes % MINUTES_PER_DAY)
    }

    /// Minutes since midnight
    pub fn minutes(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl std::str::FromStr for ClockTime {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self> {
        let (hour, minute) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| GateError::invalid(format!("clock time '{s}' must be HH:MM")))?;
        let hour = hour
            .parse::<u8>()
            .map_err(|_| GateError::invalid(format!("clock time '{s}' has a bad hour")))?;
        let minute = minute
            .parse::<u8>()
            .map_err(|_| GateError::invalid(format!("clock time '{s}' has a bad minute")))?;
        Self::new(hour, minute)
    }
}

impl TryFrom<String> for ClockTime {
    type Error = GateError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(time: ClockTime) -> Self {
        time.to_string()
    }
}

/// A point on the campus wall clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalMoment {
    /// Local weekday
    pub day: DayOfWeek,
    /// Local time of day
    pub time: ClockTime,
}

/// Whether `time` falls within `[start, end]`, wrapping past midnight when `end < start`
pub(crate) fn within_inclusive(time: ClockTime, start: ClockTime, end: ClockTime) -> bool {
    if start <= end {
        start <= time && time <= end
    } else {
        time >= start || time <= end
    }
}
