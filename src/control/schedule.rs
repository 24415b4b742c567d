//! # Schedule Store
//!
//! Interval index over the 24-hour cycle (minutes `0..1440`). Each zone's
//! schedule maps half-open `[start, end)` spans of the day to a value.
//!
//! Intervals live in an arena and are identified by a monotonically increasing
//! [`IntervalId`] assigned at insertion. A sorted index over span starts keeps
//! point queries to a binary search plus a scan of the candidates that begin
//! at or before the query point.
//!
//! Overlaps are allowed. When several intervals cover the query point, the
//! most recently inserted one wins.

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const MINUTES_PER_DAY: u16 = 24 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Invalid time of day: {0}")]
    InvalidTime(String),

    #[error("Invalid interval: start {start} end {end}")]
    InvalidInterval { start: u16, end: u16 },
}

/// Value associated with a scheduled interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleValue {
    /// Heat to the zone's configured target
    On,
    Off,
    /// Heat to an explicit target in degrees Celsius
    Temperature(f64),
}

/// Minute of the day, `0..=1440`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub fn new(hour: u16, minute: u16) -> Result<Self, ScheduleError> {
        let minutes = u32::from(hour) * 60 + u32::from(minute);
        if minute >= 60 || minutes > u32::from(MINUTES_PER_DAY) {
            return Err(ScheduleError::InvalidTime(format!("{hour:02}:{minute:02}")));
        }
        Ok(Self(minutes as u16))
    }

    pub fn from_minutes(minutes: u16) -> Result<Self, ScheduleError> {
        if minutes > MINUTES_PER_DAY {
            return Err(ScheduleError::InvalidTime(minutes.to_string()));
        }
        Ok(Self(minutes))
    }

    pub fn from_time(time: NaiveTime) -> Self {
        Self((time.hour() * 60 + time.minute()) as u16)
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    /// Parse `HH:MM`; `24:00` denotes the end of the day
    pub fn parse(text: &str) -> Result<Self, ScheduleError> {
        let invalid = || ScheduleError::InvalidTime(text.to_string());
        let (hour, minute) = text.trim().split_once(':').ok_or_else(invalid)?;
        let hour: u16 = hour.parse().map_err(|_| invalid())?;
        let minute: u16 = minute.parse().map_err(|_| invalid())?;
        Self::new(hour, minute).map_err(|_| invalid())
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Scheduled span of the day.
///
/// `end < start` wraps past midnight. `start == end` is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduleInterval {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    pub value: ScheduleValue,
}

impl ScheduleInterval {
    pub fn new(start: TimeOfDay, end: TimeOfDay, value: ScheduleValue) -> Self {
        Self { start, end, value }
    }

    /// Build from `HH:MM` strings
    pub fn parse(start: &str, end: &str, value: ScheduleValue) -> Result<Self, ScheduleError> {
        Ok(Self::new(TimeOfDay::parse(start)?, TimeOfDay::parse(end)?, value))
    }

    /// Non-wrapping `[start, end)` minute spans covered by this interval
    fn spans(&self) -> Result<Vec<(u16, u16)>, ScheduleError> {
        let (start, end) = (self.start.minutes(), self.end.minutes());
        let invalid = ScheduleError::InvalidInterval { start, end };
        if start == end || start >= MINUTES_PER_DAY {
            return Err(invalid);
        }
        if start < end {
            return Ok(vec![(start, end)]);
        }
        // Past midnight
        let mut spans = vec![(start, MINUTES_PER_DAY)];
        if end > 0 {
            spans.push((0, end));
        }
        Ok(spans)
    }
}

/// Handle of an inserted interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IntervalId(u64);

#[derive(Debug, Clone)]
struct Span {
    start: u16,
    end: u16,
    id: IntervalId,
}

/// Interval index answering "what applies at this minute of the day"
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    /// Inserted intervals in insertion order
    entries: Vec<(IntervalId, ScheduleInterval)>,
    /// Spans sorted by `(start, id)`
    spans: Vec<Span>,
    next_id: u64,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_intervals<I>(intervals: I) -> Result<Self, ScheduleError>
    where
        I: IntoIterator<Item = ScheduleInterval>,
    {
        let mut schedule = Self::new();
        for interval in intervals {
            schedule.insert(interval)?;
        }
        Ok(schedule)
    }

    pub fn insert(&mut self, interval: ScheduleInterval) -> Result<IntervalId, ScheduleError> {
        let spans = interval.spans()?;
        let id = IntervalId(self.next_id);
        self.next_id += 1;

        for (start, end) in spans {
            let at = self
                .spans
                .partition_point(|s| (s.start, s.id) <= (start, id));
            self.spans.insert(at, Span { start, end, id });
        }
        self.entries.push((id, interval));
        Ok(id)
    }

    pub fn remove(&mut self, id: IntervalId) -> Option<ScheduleInterval> {
        let position = self.entries.iter().position(|(entry, _)| *entry == id)?;
        self.spans.retain(|span| span.id != id);
        Some(self.entries.remove(position).1)
    }

    /// Value at `hour:minute`, `None` when no interval covers it
    pub fn query(&self, hour: u32, minute: u32) -> Option<ScheduleValue> {
        let point = hour.checked_mul(60)?.checked_add(minute)?;
        if point >= u32::from(MINUTES_PER_DAY) {
            return None;
        }
        self.query_minute(point as u16)
    }

    pub fn query_time(&self, time: NaiveTime) -> Option<ScheduleValue> {
        self.query(time.hour(), time.minute())
    }

    fn query_minute(&self, point: u16) -> Option<ScheduleValue> {
        let candidates = self.spans.partition_point(|s| s.start <= point);
        let winner = self.spans[..candidates]
            .iter()
            .filter(|span| point < span.end)
            .map(|span| span.id)
            .max()?;
        self.get(winner).map(|interval| interval.value)
    }

    pub fn get(&self, id: IntervalId) -> Option<&ScheduleInterval> {
        self.entries
            .iter()
            .find(|(entry, _)| *entry == id)
            .map(|(_, interval)| interval)
    }

    /// Every interval in insertion order
    pub fn intervals(&self) -> Vec<ScheduleInterval> {
        self.entries.iter().map(|(_, interval)| *interval).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
