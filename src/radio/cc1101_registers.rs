//! # CC1101 Register Definitions and Constants
//!
//! Register addresses, command strobes, access flags and the static
//! configuration table for the TI CC1101 transceiver, as used by the radiator
//! link (868 MHz, 2-FSK, variable-length packets with appended status bytes).
//!
//! ## Address byte
//!
//! Every SPI transaction starts with an address byte:
//! - bit 7: read (1) / write (0)
//! - bit 6: burst access
//! - bits 5..0: register address
//!
//! Addresses 0x30-0x3D are command strobes when accessed without the burst
//! bit and status registers when accessed with it.

// =============================================================================
// Access flags
// =============================================================================

pub const WRITE_SINGLE_BYTE: u8 = 0x00;
pub const WRITE_BURST: u8 = 0x40;
pub const READ_SINGLE_BYTE: u8 = 0x80;
pub const READ_BURST: u8 = 0xC0;

/// Address stride between successive bytes of a burst transfer
pub const BURST_STRIDE: u8 = 8;

// =============================================================================
// Command strobes
// =============================================================================

/// Reset chip
pub const SRES: u8 = 0x30;
/// Enable RX
pub const SRX: u8 = 0x34;
/// Enable TX
pub const STX: u8 = 0x35;
/// Exit RX/TX, enter IDLE
pub const SIDLE: u8 = 0x36;
/// Flush the RX FIFO
pub const SFRX: u8 = 0x3A;
/// Flush the TX FIFO
pub const SFTX: u8 = 0x3B;
/// No operation, returns the chip status byte
pub const SNOP: u8 = 0x3D;

// =============================================================================
// Status registers (burst bit included)
// =============================================================================

pub const PARTNUM: u8 = 0xF0;
pub const VERSION: u8 = 0xF1;
/// Overflow flag and number of bytes in the RX FIFO
pub const RXBYTES: u8 = 0xFB;

/// Expected silicon identification
pub const EXPECTED_VERSION: u8 = 0x14;
pub const EXPECTED_PARTNUM: u8 = 0x00;

// =============================================================================
// FIFOs and status byte fields
// =============================================================================

pub const RXFIFO: u8 = 0x3F;
pub const TXFIFO: u8 = 0x3F;

pub const RXFIFO_OVERFLOW: u8 = 0x80;
pub const BYTES_IN_RXFIFO: u8 = 0x7F;

/// CRC-OK flag in the second appended status byte
pub const CRC_OK: u8 = 0x80;
pub const LQI_MASK: u8 = 0x7F;
pub const RSSI_OFFSET: i16 = 74;

/// Chip status byte fields
pub const STATUS_CHIP_RDYN: u8 = 0x80;
pub const STATUS_STATE_MASK: u8 = 0x70;
pub const STATUS_FIFO_BYTES: u8 = 0x0F;

// =============================================================================
// Configuration registers
// =============================================================================

pub const IOCFG2: u8 = 0x00;
pub const IOCFG1: u8 = 0x01;
pub const IOCFG0: u8 = 0x02;
pub const FIFOTHR: u8 = 0x03;
pub const SYNC1: u8 = 0x04;
pub const SYNC0: u8 = 0x05;
pub const PKTLEN: u8 = 0x06;
pub const PKTCTRL1: u8 = 0x07;
pub const PKTCTRL0: u8 = 0x08;
pub const ADDR: u8 = 0x09;
pub const CHANNR: u8 = 0x0A;
pub const FSCTRL1: u8 = 0x0B;
pub const FSCTRL0: u8 = 0x0C;
pub const FREQ2: u8 = 0x0D;
pub const FREQ1: u8 = 0x0E;
pub const FREQ0: u8 = 0x0F;
pub const MDMCFG4: u8 = 0x10;
pub const MDMCFG3: u8 = 0x11;
pub const MDMCFG2: u8 = 0x12;
pub const MDMCFG1: u8 = 0x13;
pub const MDMCFG0: u8 = 0x14;
pub const DEVIATN: u8 = 0x15;
pub const MCSM2: u8 = 0x16;
pub const MCSM1: u8 = 0x17;
pub const MCSM0: u8 = 0x18;
pub const FOCCFG: u8 = 0x19;
pub const BSCFG: u8 = 0x1A;
pub const AGCCTRL2: u8 = 0x1B;
pub const AGCCTRL1: u8 = 0x1C;
pub const AGCCTRL0: u8 = 0x1D;
pub const WOREVT1: u8 = 0x1E;
pub const WOREVT0: u8 = 0x1F;
pub const WORCTRL: u8 = 0x20;
pub const FREND1: u8 = 0x21;
pub const FREND0: u8 = 0x22;
pub const FSCAL3: u8 = 0x23;
pub const FSCAL2: u8 = 0x24;
pub const FSCAL1: u8 = 0x25;
pub const FSCAL0: u8 = 0x26;
pub const RCCTRL1: u8 = 0x27;
pub const RCCTRL0: u8 = 0x28;
pub const FSTEST: u8 = 0x29;
pub const PTEST: u8 = 0x2A;
pub const AGCTEST: u8 = 0x2B;
pub const TEST2: u8 = 0x2C;
pub const TEST1: u8 = 0x2D;
pub const TEST0: u8 = 0x2E;

/// Largest variable-length packet the chip accepts (PKTLEN)
pub const MAX_PACKET_LENGTH: u8 = 0x3D;

/// Default sync word of the radiator network
pub const DEFAULT_SYNC_WORD: u16 = 0xD391;

/// Static register configuration written by `init`.
///
/// 868.3 MHz, 2-FSK. GDO2 asserts on sync word sent and deasserts at end of
/// packet; GDO0 asserts when a packet with a valid CRC sits in the RX FIFO.
pub const INIT_REGISTERS: &[(u8, u8)] = &[
    (FSCTRL1, 0x06),
    (FSCTRL0, 0x00),
    (FREQ2, 0x21),
    (FREQ1, 0x65),
    (FREQ0, 0x44),
    (MDMCFG4, 0xF5),
    (MDMCFG3, 0x83),
    (MDMCFG2, 0x03),
    (MDMCFG1, 0x22),
    (MDMCFG0, 0xF8),
    (CHANNR, 0x00),
    (DEVIATN, 0x34),
    (FREND1, 0x56),
    (FREND0, 0x10),
    (MCSM0, 0x18),
    (FOCCFG, 0x16),
    (BSCFG, 0x6C),
    (AGCCTRL2, 0x03),
    (AGCCTRL1, 0x40),
    (AGCCTRL0, 0x91),
    (FSCAL3, 0xE9),
    (FSCAL2, 0x2A),
    (FSCAL1, 0x00),
    (FSCAL0, 0x1F),
    (FSTEST, 0x59),
    (TEST2, 0x81),
    (TEST1, 0x35),
    (TEST0, 0x09),
    (IOCFG2, 0x06),
    (IOCFG1, 0x2E),
    (IOCFG0, 0x07),
    // Two status bytes appended to payload: RSSI, LQI and CRC OK
    (PKTCTRL1, 0x04),
    // No address check, whitening off, CRC on, variable length
    (PKTCTRL0, 0x05),
    (ADDR, 0x00),
    (PKTLEN, MAX_PACKET_LENGTH),
];
