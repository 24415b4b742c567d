//! # Radio Packet Formats
//!
//! Radiator addressing, the 9-byte control and pairing packets understood by
//! the radiator thermostats, decoding of the status bytes the CC1101 appends to
//! received packets, and the 4-byte sensor report.

use crate::radio::cc1101_registers::{CRC_OK, LQI_MASK, RSSI_OFFSET};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced while parsing packet-level values
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("Invalid radio address: {0}")]
    InvalidAddress(String),

    #[error("Unknown radiator mode: {0}")]
    UnknownMode(String),

    #[error("Expected sensor packet of 4 bytes, got {0}")]
    SensorLength(usize),
}

/// 2-byte big-endian identifier of a physical radiator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RadioAddress(u16);

impl RadioAddress {
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn from_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_be_bytes(bytes))
    }

    pub const fn to_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl fmt::Display for RadioAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

impl FromStr for RadioAddress {
    type Err = PacketError;

    /// Parses "2b7e", "0x2B7E" or "2B 7E"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let compact: String = digits.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes =
            hex::decode(&compact).map_err(|_| PacketError::InvalidAddress(s.to_string()))?;
        let bytes: [u8; 2] = bytes
            .try_into()
            .map_err(|_| PacketError::InvalidAddress(s.to_string()))?;
        Ok(Self::from_bytes(bytes))
    }
}

impl TryFrom<String> for RadioAddress {
    type Error = PacketError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RadioAddress> for String {
    fn from(address: RadioAddress) -> Self {
        hex::encode(address.to_bytes())
    }
}

/// Operating mode byte of a radiator command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RadiatorMode {
    Day = 0x05,
    Night = 0x03,
    Defrost = 0x09,
    Off = 0x60,
    Auto = 0x11,
}

impl RadiatorMode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x05 => Some(Self::Day),
            0x03 => Some(Self::Night),
            0x09 => Some(Self::Defrost),
            0x60 => Some(Self::Off),
            0x11 => Some(Self::Auto),
            _ => None,
        }
    }
}

impl FromStr for RadiatorMode {
    type Err = PacketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "night" => Ok(Self::Night),
            "defrost" | "cold" => Ok(Self::Defrost),
            "off" => Ok(Self::Off),
            "auto" => Ok(Self::Auto),
            _ => Err(PacketError::UnknownMode(s.to_string())),
        }
    }
}

/// Packet header identifying the message family
pub const PACKET_PREFIX: u8 = 0x57;
pub const PACKET_SUFFIX: u8 = 0x0A;
pub const CONTROL_KIND: u8 = 0x16;
pub const PAIRING_KIND: u8 = 0x96;

/// Length of a radiator control or pairing packet
pub const RADIATOR_PACKET_LEN: usize = 9;

/// Encode a temperature at half-degree resolution
pub fn encode_temperature(celsius: f32) -> u8 {
    (celsius * 2.0).round().clamp(0.0, 255.0) as u8
}

pub fn decode_temperature(byte: u8) -> f32 {
    f32::from(byte) / 2.0
}

/// Mode and temperature set points sent to one radiator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiatorCommand {
    pub address: RadioAddress,
    pub mode: RadiatorMode,
    pub day_temperature: f32,
    pub night_temperature: f32,
    pub cold_temperature: f32,
}

impl RadiatorCommand {
    fn encode(&self, kind: u8) -> [u8; RADIATOR_PACKET_LEN] {
        let [hi, lo] = self.address.to_bytes();
        [
            PACKET_PREFIX,
            kind,
            PACKET_SUFFIX,
            hi,
            lo,
            self.mode as u8,
            encode_temperature(self.day_temperature),
            encode_temperature(self.night_temperature),
            encode_temperature(self.cold_temperature),
        ]
    }

    pub fn control_packet(&self) -> [u8; RADIATOR_PACKET_LEN] {
        self.encode(CONTROL_KIND)
    }

    /// Packet assigning `address` to a unit in pairing mode
    pub fn pairing_packet(&self) -> [u8; RADIATOR_PACKET_LEN] {
        self.encode(PAIRING_KIND)
    }

    /// Decode a control or pairing packet
    pub fn parse(packet: &[u8]) -> Option<(Self, bool)> {
        if packet.len() != RADIATOR_PACKET_LEN
            || packet[0] != PACKET_PREFIX
            || packet[2] != PACKET_SUFFIX
        {
            return None;
        }
        let pairing = match packet[1] {
            CONTROL_KIND => false,
            PAIRING_KIND => true,
            _ => return None,
        };
        let command = Self {
            address: RadioAddress::from_bytes([packet[3], packet[4]]),
            mode: RadiatorMode::from_byte(packet[5])?,
            day_temperature: decode_temperature(packet[6]),
            night_temperature: decode_temperature(packet[7]),
            cold_temperature: decode_temperature(packet[8]),
        };
        Some((command, pairing))
    }
}

/// Convert the raw RSSI status byte to dBm
pub fn decode_rssi(raw: u8) -> i16 {
    let rssi = i16::from(raw);
    if rssi >= 128 {
        (rssi - 256) / 2 - RSSI_OFFSET
    } else {
        rssi / 2 - RSSI_OFFSET
    }
}

/// Link-quality metadata from the two appended status bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkQuality {
    pub rssi_dbm: i16,
    pub lqi: u8,
    pub crc_ok: bool,
}

impl LinkQuality {
    pub fn from_status(rssi: u8, lqi_crc: u8) -> Self {
        Self {
            rssi_dbm: decode_rssi(rssi),
            lqi: lqi_crc & LQI_MASK,
            crc_ok: lqi_crc & CRC_OK != 0,
        }
    }
}

/// Packet drained from the RX FIFO
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReceivedPacket {
    pub payload: Vec<u8>,
    /// `None` for the empty result of a spurious interrupt
    pub quality: Option<LinkQuality>,
}

impl ReceivedPacket {
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Temperature/humidity report broadcast by a sensor node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReport {
    pub temperature: f32,
    pub humidity: f32,
}

impl SensorReport {
    /// Decode `[temp_hi, temp_lo, hum_hi, hum_lo]`, both scaled by 100
    pub fn parse(packet: &[u8]) -> Result<Self, PacketError> {
        let bytes: [u8; 4] = packet
            .try_into()
            .map_err(|_| PacketError::SensorLength(packet.len()))?;
        Ok(Self {
            temperature: f32::from(u16::from_be_bytes([bytes[0], bytes[1]])) / 100.0,
            humidity: f32::from(u16::from_be_bytes([bytes[2], bytes[3]])) / 100.0,
        })
    }
}
