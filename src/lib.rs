//! # heatlink - Per-room radiator control over a CC1101 radio link
//!
//! The heatlink crate drives battery radiator thermostats from a Raspberry Pi
//! with a CC1101 sub-GHz transceiver on its SPI bus.
//!
//! ## Features
//!
//! - CC1101 driver: register and FIFO access, startup self-test, bounded
//!   transmit, interrupt-driven receive with RSSI/LQI decoding
//! - Radiator control and pairing packets, sensor report decoding
//! - Per-zone schedules with half-open intervals over the day
//! - PID-based heating decisions fed by an external temperature feed
//! - Pluggable hardware: Raspberry Pi (feature `raspberry-pi`) or scripted mocks
//!
//! ## Usage
//!
//! ```rust,no_run
//! use heatlink::radio::hal::mock::{MockBus, MockLine};
//! use heatlink::{Cc1101, RadioConfig};
//!
//! let radio = Cc1101::new(MockBus::new(), MockLine::tx_pulse(), RadioConfig::default());
//! radio.send(&[0x57, 0x16, 0x0A, 0x2B, 0x7E, 0x05, 60, 60, 20])?;
//! # Ok::<(), heatlink::RadioError>(())
//! ```

pub mod config;
pub mod constants;
pub mod control;
pub mod error;
pub mod logging;
pub mod radio;

pub use crate::config::{Config, ConfigError, ZoneConfig};
pub use crate::error::HeatError;
pub use crate::logging::init_logger;

// Radio link
pub use radio::{
    Cc1101, ChipState, LinkStats, RadiatorCommand, RadiatorMode, RadioAddress, RadioConfig,
    RadioError, ReceivedPacket, ReceiverHandle,
};

// Heating control
pub use control::{
    HeatingController, HeatingState, LoggingRadiatorController, PidController, PidGains,
    RadiatorController, RadioRadiatorController, Schedule, ScheduleInterval, ScheduleValue,
    Target, TemperatureFeed,
};
