//! # Hardware Abstraction Layer for the Radio Link
//!
//! This module defines the two capabilities the CC1101 driver needs from the
//! platform: a full-duplex register bus (SPI) and interrupt-capable digital
//! input lines (the chip's GDO0/GDO2 outputs). The driver treats both as opaque
//! and never touches platform APIs directly.

use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors that can occur during HAL operations
#[derive(Debug, Error)]
pub enum HalError {
    #[error("SPI transfer failed: {0}")]
    Spi(String),

    #[error("GPIO operation failed: {0}")]
    Gpio(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Signal edge on a digital input line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeType {
    Rising,
    Falling,
}

impl EdgeType {
    /// Line level after the edge has occurred
    pub fn target_level(self) -> bool {
        matches!(self, EdgeType::Rising)
    }
}

/// Interval between level samples in the polling fallbacks below
pub const LINE_POLL_INTERVAL: Duration = Duration::from_micros(50);

/// Full-duplex register bus.
///
/// A transaction shifts every byte of `buf` out to the chip and overwrites it
/// in place with the bytes shifted back, so the response always has the same
/// length as the request.
pub trait Bus: Send {
    fn transfer(&mut self, buf: &mut [u8]) -> Result<(), HalError>;
}

/// Digital input line driven by the radio (GDO0 / GDO2).
pub trait InputLine: Send {
    /// Sample the current line level
    fn is_high(&mut self) -> Result<bool, HalError>;

    /// Block until the line reads `level` or `timeout` elapses.
    ///
    /// Returns `Ok(false)` on timeout.
    fn wait_for_level(&mut self, level: bool, timeout: Duration) -> Result<bool, HalError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_high()? == level {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            thread::sleep(LINE_POLL_INTERVAL);
        }
    }

    /// Block until `edge` is observed or `timeout` elapses.
    ///
    /// The polling fallback requires the line to be seen at the opposite level
    /// first. Platforms with real edge interrupts override this.
    fn wait_for_edge(&mut self, edge: EdgeType, timeout: Duration) -> Result<bool, HalError> {
        let deadline = Instant::now() + timeout;
        let target = edge.target_level();
        let mut armed = false;
        loop {
            let level = self.is_high()?;
            if level != target {
                armed = true;
            } else if armed {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            thread::sleep(LINE_POLL_INTERVAL);
        }
    }
}

impl<B: Bus + ?Sized> Bus for Box<B> {
    fn transfer(&mut self, buf: &mut [u8]) -> Result<(), HalError> {
        (**self).transfer(buf)
    }
}

impl<L: InputLine + ?Sized> InputLine for Box<L> {
    fn is_high(&mut self) -> Result<bool, HalError> {
        (**self).is_high()
    }

    fn wait_for_level(&mut self, level: bool, timeout: Duration) -> Result<bool, HalError> {
        (**self).wait_for_level(level, timeout)
    }

    fn wait_for_edge(&mut self, edge: EdgeType, timeout: Duration) -> Result<bool, HalError> {
        (**self).wait_for_edge(edge, timeout)
    }
}

pub mod mock;

// Platform implementations
#[cfg(feature = "raspberry-pi")]
pub mod raspberry_pi;

pub use mock::{MockBus, MockLine};

#[cfg(feature = "raspberry-pi")]
pub use raspberry_pi::{RaspberryPiBus, RaspberryPiLine};
