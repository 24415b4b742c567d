//! # Raspberry Pi HAL Implementation
//!
//! SPI bus and GDO line access for a CC1101 module wired to a Raspberry Pi,
//! using the rppal crate.
//!
//! ## Pinout (40-pin GPIO header)
//!
//! ```text
//! Pi Pin │ BCM GPIO │ CC1101 Pin │ Function
//! ───────┼──────────┼────────────┼──────────────────────────
//! 19     │ GPIO 10  │ SI         │ SPI data out
//! 21     │ GPIO 9   │ SO         │ SPI data in
//! 23     │ GPIO 11  │ SCLK       │ SPI clock
//! 24     │ GPIO 8   │ CSn        │ Chip select
//! 18     │ GPIO 24  │ GDO0       │ Packet received (input)
//! 22     │ GPIO 25  │ GDO2       │ Sync / end of packet (input)
//! ```

use crate::config::RadioSettings;
use crate::radio::hal::{Bus, EdgeType, HalError, InputLine};
use rppal::gpio::{Gpio, InputPin, Level, Trigger};
use rppal::spi::{BitOrder, Bus as SpiBus, Mode, SlaveSelect, Spi};
use std::time::Duration;

/// Hardware SPI bus to the CC1101
pub struct RaspberryPiBus {
    spi: Spi,
}

impl RaspberryPiBus {
    pub fn new(spi_bus: u8, clock_hz: u32) -> Result<Self, HalError> {
        let bus = match spi_bus {
            0 => SpiBus::Spi0,
            1 => SpiBus::Spi1,
            _ => {
                return Err(HalError::InvalidConfig(format!(
                    "Invalid SPI bus {}, only 0 and 1 are supported",
                    spi_bus
                )))
            }
        };

        let spi = Spi::new(bus, SlaveSelect::Ss0, clock_hz, Mode::Mode0)
            .map_err(|e| HalError::Spi(format!("SPI initialization failed: {}", e)))?;
        spi.set_bit_order(BitOrder::MsbFirst)
            .map_err(|e| HalError::Spi(format!("SPI bit order: {}", e)))?;

        log::info!("SPI{} opened at {} Hz", spi_bus, clock_hz);
        Ok(Self { spi })
    }
}

impl Bus for RaspberryPiBus {
    fn transfer(&mut self, buf: &mut [u8]) -> Result<(), HalError> {
        let write = buf.to_vec();
        self.spi
            .transfer(buf, &write)
            .map_err(|e| HalError::Spi(e.to_string()))?;
        Ok(())
    }
}

/// GDO input pin with edge interrupts
pub struct RaspberryPiLine {
    pin: InputPin,
    trigger: Option<Trigger>,
}

impl RaspberryPiLine {
    pub fn new(gpio: &Gpio, bcm_pin: u8) -> Result<Self, HalError> {
        let pin = gpio
            .get(bcm_pin)
            .map_err(|e| HalError::Gpio(format!("GPIO {}: {}", bcm_pin, e)))?
            .into_input();
        Ok(Self { pin, trigger: None })
    }

    fn arm(&mut self, trigger: Trigger) -> Result<(), HalError> {
        if self.trigger != Some(trigger) {
            self.pin
                .set_interrupt(trigger)
                .map_err(|e| HalError::Gpio(format!("Failed to set interrupt: {}", e)))?;
            self.trigger = Some(trigger);
        }
        Ok(())
    }
}

impl InputLine for RaspberryPiLine {
    fn is_high(&mut self) -> Result<bool, HalError> {
        Ok(self.pin.is_high())
    }

    fn wait_for_edge(&mut self, edge: EdgeType, timeout: Duration) -> Result<bool, HalError> {
        let trigger = match edge {
            EdgeType::Rising => Trigger::RisingEdge,
            EdgeType::Falling => Trigger::FallingEdge,
        };
        self.arm(trigger)?;
        let level = self
            .pin
            .poll_interrupt(false, Some(timeout))
            .map_err(|e| HalError::Gpio(e.to_string()))?;
        Ok(matches!(
            (edge, level),
            (EdgeType::Rising, Some(Level::High)) | (EdgeType::Falling, Some(Level::Low))
        ))
    }
}

/// Open the SPI bus and both GDO lines described by `settings`.
///
/// Returns `(bus, gdo0, gdo2)`.
pub fn open(
    settings: &RadioSettings,
) -> Result<(RaspberryPiBus, RaspberryPiLine, RaspberryPiLine), HalError> {
    let bus = RaspberryPiBus::new(settings.spi_bus, settings.spi_clock_hz)?;
    let gpio = Gpio::new().map_err(|e| HalError::Gpio(format!("GPIO init failed: {}", e)))?;
    let gdo0 = RaspberryPiLine::new(&gpio, settings.gdo0_pin)?;
    let gdo2 = RaspberryPiLine::new(&gpio, settings.gdo2_pin)?;
    log::info!(
        "GDO0 on GPIO {}, GDO2 on GPIO {}",
        settings.gdo0_pin,
        settings.gdo2_pin
    );
    Ok((bus, gdo0, gdo2))
}
