//! # Heatlink Error Handling
//!
//! Each layer has its own error enum next to the code that raises it. This
//! module gathers them into [`HeatError`] for callers that drive the whole
//! system.

use thiserror::Error;

use crate::config::ConfigError;
use crate::control::controller::ControlError;
use crate::control::schedule::ScheduleError;
use crate::control::sources::SourceError;
use crate::radio::cc1101::RadioError;
use crate::radio::hal::HalError;
use crate::radio::packet::PacketError;

/// Represents every error that can surface from the heatlink crate.
#[derive(Debug, Error)]
pub enum HeatError {
    /// SPI or GPIO failure below the radio driver.
    #[error("Hardware error: {0}")]
    Hal(#[from] HalError),

    /// Radio link failure (self-test, FIFO, transmit).
    #[error("Radio error: {0}")]
    Radio(#[from] RadioError),

    /// Malformed address, mode or sensor packet.
    #[error("Packet error: {0}")]
    Packet(#[from] PacketError),

    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    /// Temperature feed or calendar failure.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radio_errors_convert() {
        let err: HeatError = RadioError::HardwareMismatch {
            version: 0x04,
            partnum: 0x00,
        }
        .into();
        assert!(matches!(
            err,
            HeatError::Radio(RadioError::HardwareMismatch { version: 0x04, .. })
        ));
    }

    #[test]
    fn test_display_includes_layer() {
        let err = HeatError::from(ControlError::UnknownZone("Attic".to_string()));
        assert_eq!(err.to_string(), "Control error: Unknown zone: Attic");
    }
}
