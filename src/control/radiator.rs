//! Radiator actuation capability.
//!
//! The heating controller only knows "on" and "off". [`RadioRadiatorController`]
//! turns those into radiator command packets sent through the CC1101;
//! [`LoggingRadiatorController`] only logs, for dry runs.

use async_trait::async_trait;
use log::{debug, info};
use std::sync::Arc;

use crate::config::ControllerSettings;
use crate::radio::cc1101::{Cc1101, RadioError};
use crate::radio::hal::{Bus, InputLine};
use crate::radio::packet::{RadiatorCommand, RadiatorMode, RadioAddress, RADIATOR_PACKET_LEN};

#[async_trait]
pub trait RadiatorController: Send + Sync {
    async fn turn_on(&self, address: RadioAddress) -> Result<(), RadioError>;
    async fn turn_off(&self, address: RadioAddress) -> Result<(), RadioError>;
}

/// Set points and repetition applied to every command
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandSettings {
    pub day_temperature: f32,
    pub night_temperature: f32,
    pub cold_temperature: f32,
    /// Radiators never acknowledge, so each packet goes out this many times
    pub repeats: u8,
}

impl CommandSettings {
    pub fn command(&self, address: RadioAddress, mode: RadiatorMode) -> RadiatorCommand {
        RadiatorCommand {
            address,
            mode,
            day_temperature: self.day_temperature,
            night_temperature: self.night_temperature,
            cold_temperature: self.cold_temperature,
        }
    }
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self::from(&ControllerSettings::default())
    }
}

impl From<&ControllerSettings> for CommandSettings {
    fn from(settings: &ControllerSettings) -> Self {
        Self {
            day_temperature: settings.day_temperature,
            night_temperature: settings.night_temperature,
            cold_temperature: settings.cold_temperature,
            repeats: settings.repeats.max(1),
        }
    }
}

/// Sends radiator commands over the CC1101.
///
/// ON is sent as `Day` mode, OFF as `Defrost` so the radiator still keeps the
/// room above the cold set point.
pub struct RadioRadiatorController<B, L> {
    radio: Arc<Cc1101<B, L>>,
    settings: CommandSettings,
}

impl<B, L> RadioRadiatorController<B, L>
where
    B: Bus + 'static,
    L: InputLine + 'static,
{
    pub fn new(radio: Arc<Cc1101<B, L>>, settings: CommandSettings) -> Self {
        Self { radio, settings }
    }

    pub fn radio(&self) -> &Arc<Cc1101<B, L>> {
        &self.radio
    }

    pub fn settings(&self) -> &CommandSettings {
        &self.settings
    }

    /// Send a control packet with an explicit mode
    pub async fn send_command(&self, command: RadiatorCommand) -> Result<(), RadioError> {
        debug!("{} -> {:?}", command.address, command.mode);
        self.transmit(command.control_packet()).await
    }

    /// Assign `command.address` to a radiator waiting in pairing mode
    pub async fn pair(&self, command: RadiatorCommand) -> Result<(), RadioError> {
        info!("Pairing radiator {}", command.address);
        self.transmit(command.pairing_packet()).await
    }

    async fn transmit(&self, packet: [u8; RADIATOR_PACKET_LEN]) -> Result<(), RadioError> {
        let radio = Arc::clone(&self.radio);
        let repeats = self.settings.repeats;
        // Sends block on GDO2, keep them off the runtime threads
        tokio::task::spawn_blocking(move || {
            for _ in 0..repeats {
                radio.send(&packet)?;
            }
            Ok(())
        })
        .await
        .map_err(|e| RadioError::Worker(e.to_string()))?
    }
}

#[async_trait]
impl<B, L> RadiatorController for RadioRadiatorController<B, L>
where
    B: Bus + 'static,
    L: InputLine + 'static,
{
    async fn turn_on(&self, address: RadioAddress) -> Result<(), RadioError> {
        self.send_command(self.settings.command(address, RadiatorMode::Day))
            .await
    }

    async fn turn_off(&self, address: RadioAddress) -> Result<(), RadioError> {
        self.send_command(self.settings.command(address, RadiatorMode::Defrost))
            .await
    }
}

/// Dry-run controller that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingRadiatorController;

#[async_trait]
impl RadiatorController for LoggingRadiatorController {
    async fn turn_on(&self, address: RadioAddress) -> Result<(), RadioError> {
        info!("[dry run] Turning on {}", address);
        Ok(())
    }

    async fn turn_off(&self, address: RadioAddress) -> Result<(), RadioError> {
        info!("[dry run] Turning off {}", address);
        Ok(())
    }
}
