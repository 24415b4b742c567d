//! # External collaborators of the control loop
//!
//! The temperature feed supplies one reading per zone each tick; the calendar
//! decides whether a calendar-scheduled zone should be heating right now.
//! Both are traits so the controller can run against real services, JSON
//! files written by a sensor bridge, or test doubles.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Local};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Temperature feed unavailable: {0}")]
    FeedUnavailable(String),

    #[error("Calendar unavailable: {0}")]
    Calendar(String),
}

/// Latest temperature of one zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureReading {
    pub zone: String,
    pub temperature: f64,
}

impl TemperatureReading {
    pub fn new(zone: impl Into<String>, temperature: f64) -> Self {
        Self {
            zone: zone.into(),
            temperature,
        }
    }
}

#[async_trait]
pub trait TemperatureFeed: Send + Sync {
    /// Fetch readings for all zones; one failure covers the whole fetch
    async fn fetch(&self) -> Result<Vec<TemperatureReading>, SourceError>;
}

#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Whether `calendar_id` has an event in progress at `now`
    async fn is_active(&self, calendar_id: &str, now: DateTime<Local>)
        -> Result<bool, SourceError>;
}

/// Readings from a JSON file: `[{"zone": "Kitchen", "temperature": 19.5}]`
#[derive(Debug, Clone)]
pub struct JsonFileFeed {
    path: PathBuf,
}

impl JsonFileFeed {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl TemperatureFeed for JsonFileFeed {
    async fn fetch(&self) -> Result<Vec<TemperatureReading>, SourceError> {
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            SourceError::FeedUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        let readings: Vec<TemperatureReading> = serde_json::from_str(&text).map_err(|e| {
            SourceError::FeedUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        debug!("Fetched {} readings from {}", readings.len(), self.path.display());
        Ok(readings)
    }
}

/// Calendar event with RFC 3339 bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl CalendarEvent {
    /// Strictly inside the event
    pub fn contains(&self, now: DateTime<Local>) -> bool {
        now > self.start && now < self.end
    }
}

/// In-memory calendar keyed by calendar id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticCalendar {
    events: HashMap<String, Vec<CalendarEvent>>,
}

impl StaticCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_event(&mut self, calendar_id: impl Into<String>, event: CalendarEvent) {
        self.events.entry(calendar_id.into()).or_default().push(event);
    }
}

#[async_trait]
impl CalendarSource for StaticCalendar {
    async fn is_active(
        &self,
        calendar_id: &str,
        now: DateTime<Local>,
    ) -> Result<bool, SourceError> {
        Ok(self
            .events
            .get(calendar_id)
            .is_some_and(|events| events.iter().any(|event| event.contains(now))))
    }
}

/// Events from a JSON file, re-read on every query so edits take effect
/// without a restart: `{"calendar-id": [{"start": "...", "end": "..."}]}`
#[derive(Debug, Clone)]
pub struct JsonFileCalendar {
    path: PathBuf,
}

impl JsonFileCalendar {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl CalendarSource for JsonFileCalendar {
    async fn is_active(
        &self,
        calendar_id: &str,
        now: DateTime<Local>,
    ) -> Result<bool, SourceError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| SourceError::Calendar(format!("{}: {}", self.path.display(), e)))?;
        let calendar: StaticCalendar = serde_json::from_str(&text)
            .map_err(|e| SourceError::Calendar(format!("{}: {}", self.path.display(), e)))?;
        calendar.is_active(calendar_id, now).await
    }
}
