//! # Configuration
//!
//! JSON configuration loaded once at startup and passed into constructors.
//!
//! ```json
//! {
//!   "radio": { "spi_bus": 0, "gdo0_pin": 24, "gdo2_pin": 25 },
//!   "controller": { "tick_period_secs": 60, "repeats": 3 },
//!   "temperature_feed": { "path": "/var/lib/heatlink/readings.json" },
//!   "calendar": { "path": "/var/lib/heatlink/calendar.json" },
//!   "zones": [
//!     {
//!       "name": "Kitchen",
//!       "radiators": ["2b7e", "0x2BDB"],
//!       "schedule": [{ "start": "06:30", "end": "22:00", "value": "on" }],
//!       "target_temperature": 20.0
//!     }
//!   ]
//! }
//! ```
//!
//! Every section except `temperature_feed` and `zones` may be omitted.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::constants::*;
use crate::control::pid::PidGains;
use crate::control::schedule::ScheduleInterval;
use crate::radio::cc1101::RadioConfig;
use crate::radio::cc1101_registers::DEFAULT_SYNC_WORD;
use crate::radio::packet::RadioAddress;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub radio: RadioSettings,
    #[serde(default)]
    pub controller: ControllerSettings,
    pub temperature_feed: FeedSettings,
    #[serde(default)]
    pub calendar: Option<CalendarSettings>,
    pub zones: Vec<ZoneConfig>,
}

/// Wiring and link policy of the CC1101
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioSettings {
    pub spi_bus: u8,
    pub spi_clock_hz: u32,
    /// BCM pin of GDO0 (packet received)
    pub gdo0_pin: u8,
    /// BCM pin of GDO2 (sync word / end of packet)
    pub gdo2_pin: u8,
    pub sync_word: u16,
    pub tx_timeout_ms: u64,
    pub settle_delay_us: u64,
}

impl Default for RadioSettings {
    fn default() -> Self {
        Self {
            spi_bus: DEFAULT_SPI_BUS,
            spi_clock_hz: DEFAULT_SPI_CLOCK_HZ,
            gdo0_pin: DEFAULT_GDO0_PIN,
            gdo2_pin: DEFAULT_GDO2_PIN,
            sync_word: DEFAULT_SYNC_WORD,
            tx_timeout_ms: DEFAULT_TX_TIMEOUT_MS,
            settle_delay_us: DEFAULT_SETTLE_DELAY_US,
        }
    }
}

impl RadioSettings {
    pub fn radio_config(&self) -> RadioConfig {
        RadioConfig {
            sync_word: self.sync_word,
            settle_delay: Duration::from_micros(self.settle_delay_us),
            tx_timeout: Duration::from_millis(self.tx_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    pub tick_period_secs: u64,
    /// Transmissions per radiator command
    pub repeats: u8,
    pub day_temperature: f32,
    pub night_temperature: f32,
    pub cold_temperature: f32,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            tick_period_secs: DEFAULT_TICK_PERIOD_SECS,
            repeats: DEFAULT_COMMAND_REPEATS,
            day_temperature: DEFAULT_DAY_TEMPERATURE,
            night_temperature: DEFAULT_NIGHT_TEMPERATURE,
            cold_temperature: DEFAULT_COLD_TEMPERATURE,
        }
    }
}

impl ControllerSettings {
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(self.tick_period_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSettings {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarSettings {
    pub path: PathBuf,
}

fn default_target_temperature() -> f64 {
    DEFAULT_TARGET_TEMPERATURE
}

/// Static description of one zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub name: String,
    #[serde(default)]
    pub radiators: Vec<RadioAddress>,
    #[serde(default)]
    pub schedule: Option<Vec<ScheduleInterval>>,
    #[serde(default)]
    pub calendar_id: Option<String>,
    #[serde(default = "default_target_temperature")]
    pub target_temperature: f64,
    #[serde(default)]
    pub pid: PidGains,
}

impl ZoneConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            radiators: Vec::new(),
            schedule: None,
            calendar_id: None,
            target_temperature: DEFAULT_TARGET_TEMPERATURE,
            pid: PidGains::default(),
        }
    }

    pub fn with_radiators(mut self, radiators: impl IntoIterator<Item = RadioAddress>) -> Self {
        self.radiators = radiators.into_iter().collect();
        self
    }

    pub fn with_schedule(mut self, schedule: Vec<ScheduleInterval>) -> Self {
        self.schedule = Some(schedule);
        self
    }

    pub fn with_calendar(mut self, calendar_id: impl Into<String>) -> Self {
        self.calendar_id = Some(calendar_id.into());
        self
    }

    pub fn with_target_temperature(mut self, celsius: f64) -> Self {
        self.target_temperature = celsius;
        self
    }
}

impl Config {
    /// Read, parse and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.controller.tick_period_secs == 0 {
            return Err(ConfigError::Invalid(
                "tick_period_secs must be positive".to_string(),
            ));
        }
        if self.controller.repeats == 0 {
            return Err(ConfigError::Invalid("repeats must be positive".to_string()));
        }

        let mut names = HashSet::new();
        for zone in &self.zones {
            if zone.name.trim().is_empty() {
                return Err(ConfigError::Invalid("zone with empty name".to_string()));
            }
            if !names.insert(zone.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate zone name {}",
                    zone.name
                )));
            }
            if zone.schedule.is_some() && zone.calendar_id.is_some() {
                return Err(ConfigError::Invalid(format!(
                    "zone {} has both a schedule and a calendar",
                    zone.name
                )));
            }
            if zone.calendar_id.is_some() && self.calendar.is_none() {
                return Err(ConfigError::Invalid(format!(
                    "zone {} uses a calendar but no calendar source is configured",
                    zone.name
                )));
            }
        }
        Ok(())
    }

    pub fn zone(&self, name: &str) -> Option<&ZoneConfig> {
        self.zones.iter().find(|zone| zone.name == name)
    }
}
