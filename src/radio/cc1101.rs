//! # CC1101 Radio Link Driver
//!
//! Turns the CC1101's strobe/register protocol into a variable-length packet
//! link for the radiator network.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────┐
//! │   Heating controller / CLI      │
//! ├─────────────────────────────────┤
//! │   Cc1101 (this file)            │  send / receive / state strobes
//! ├─────────────────────────────────┤
//! │   Bus + InputLine (hal)         │  SPI transfers, GDO0 / GDO2
//! ├─────────────────────────────────┤
//! │   Platform impl (rppal, mock)   │
//! └─────────────────────────────────┘
//! ```
//!
//! The bus and the TX-complete line (GDO2) live behind a single mutex. `send`
//! and `receive` hold it for their whole transaction sequence, including the
//! wait for the end-of-packet edge, so a FIFO drain can never interleave with
//! another thread's register writes.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use heatlink::radio::cc1101::{Cc1101, RadioConfig};
//! use heatlink::radio::hal::{MockBus, MockLine};
//!
//! let radio = Cc1101::new(MockBus::new(), MockLine::tx_pulse(), RadioConfig::default());
//! radio.start()?;
//! radio.send(&[0x57, 0x16, 0x0A, 0x2B, 0x7E, 0x05, 60, 60, 20])?;
//! # Ok::<(), heatlink::radio::cc1101::RadioError>(())
//! ```

use crate::radio::cc1101_registers::*;
use crate::radio::hal::{Bus, EdgeType, HalError, InputLine};
use crate::radio::packet::{LinkQuality, ReceivedPacket};
use log::{debug, error, info, trace, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;

/// Largest payload `send` accepts
pub const MAX_PAYLOAD: usize = 60;

/// Worst-case IDLE -> RX transition with calibration
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1);

/// Bound on the wait for the TX-complete edge
pub const DEFAULT_TX_TIMEOUT: Duration = Duration::from_millis(500);

/// How long the receiver waits for GDO0 before re-checking for shutdown
pub const RECEIVER_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Radio link errors
#[derive(Debug, Error)]
pub enum RadioError {
    #[error("Bus transaction failed: {0}")]
    Bus(#[from] HalError),

    #[error("Hardware mismatch: version 0x{version:02X}, partnum 0x{partnum:02X}")]
    HardwareMismatch { version: u8, partnum: u8 },

    #[error("RX FIFO overflow")]
    FifoOverflow,

    #[error("Packet too large: {len} bytes (max {max})")]
    PacketTooLarge { len: usize, max: usize },

    #[error("Invalid packet length byte: {0}")]
    InvalidLength(u8),

    #[error("Timed out waiting for {0}")]
    TxTimeout(&'static str),

    #[error("Radio worker failed: {0}")]
    Worker(String),
}

/// Chip state as driven by the strobes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipState {
    Idle,
    Rx,
    Tx,
}

impl ChipState {
    fn strobe(self) -> u8 {
        match self {
            ChipState::Idle => SIDLE,
            ChipState::Rx => SRX,
            ChipState::Tx => STX,
        }
    }
}

/// Main radio control state machine state, from the chip status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarcState {
    Idle,
    Rx,
    Tx,
    FsTxOn,
    Calibrate,
    Settling,
    RxFifoOverflow,
    TxFifoUnderflow,
}

/// Decoded chip status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipStatus {
    pub chip_ready: bool,
    pub state: MarcState,
    pub fifo_bytes_available: u8,
}

impl ChipStatus {
    pub fn from_byte(status: u8) -> Self {
        let state = match (status & STATUS_STATE_MASK) >> 4 {
            0 => MarcState::Idle,
            1 => MarcState::Rx,
            2 => MarcState::Tx,
            3 => MarcState::FsTxOn,
            4 => MarcState::Calibrate,
            5 => MarcState::Settling,
            6 => MarcState::RxFifoOverflow,
            _ => MarcState::TxFifoUnderflow,
        };
        Self {
            chip_ready: status & STATUS_CHIP_RDYN == 0,
            state,
            fifo_bytes_available: status & STATUS_FIFO_BYTES,
        }
    }
}

/// Driver policy
#[derive(Debug, Clone)]
pub struct RadioConfig {
    pub sync_word: u16,
    /// Delay after every state strobe
    pub settle_delay: Duration,
    /// Bound on each half of the TX-complete wait
    pub tx_timeout: Duration,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            sync_word: DEFAULT_SYNC_WORD,
            settle_delay: DEFAULT_SETTLE_DELAY,
            tx_timeout: DEFAULT_TX_TIMEOUT,
        }
    }
}

/// Link statistics for monitoring
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkStats {
    pub packets_sent: u32,
    pub send_failures: u32,
    pub packets_received: u32,
    pub fifo_overflows: u32,
    pub last_rssi_dbm: Option<i16>,
}

/// Bus-side state guarded by the driver lock
struct Link<B, L> {
    bus: B,
    /// Sync sent (rising) / packet sent (falling)
    gdo2: L,
    state: ChipState,
    /// Receiver thread active; `send` returns to RX afterwards
    listening: bool,
    settle_delay: Duration,
}

impl<B: Bus, L: InputLine> Link<B, L> {
    fn transfer(&mut self, buf: &mut [u8]) -> Result<(), RadioError> {
        trace!("SPI >> {}", hex::encode(&*buf));
        self.bus.transfer(buf)?;
        trace!("SPI << {}", hex::encode(&*buf));
        Ok(())
    }

    fn strobe(&mut self, command: u8) -> Result<u8, RadioError> {
        let mut buf = [command, 0x00];
        self.transfer(&mut buf)?;
        Ok(buf[0])
    }

    fn read_single(&mut self, register: u8) -> Result<u8, RadioError> {
        let mut buf = [register | READ_SINGLE_BYTE, 0x00];
        self.transfer(&mut buf)?;
        Ok(buf[1])
    }

    fn write_single(&mut self, register: u8, value: u8) -> Result<(), RadioError> {
        let mut buf = [register | WRITE_SINGLE_BYTE, value];
        self.transfer(&mut buf)
    }

    fn read_burst(&mut self, register: u8, count: u8) -> Result<Vec<u8>, RadioError> {
        let mut buf = burst_read_addresses(register, count);
        self.transfer(&mut buf)?;
        buf.remove(0);
        Ok(buf)
    }

    fn write_burst(&mut self, register: u8, data: &[u8]) -> Result<(), RadioError> {
        let mut buf = Vec::with_capacity(data.len() + 1);
        buf.push(register | WRITE_BURST);
        buf.extend_from_slice(data);
        self.transfer(&mut buf)
    }

    fn set_state(&mut self, state: ChipState) -> Result<(), RadioError> {
        debug!("Setting chip state: {:?}", state);
        self.strobe(state.strobe())?;
        self.state = state;
        if !self.settle_delay.is_zero() {
            thread::sleep(self.settle_delay);
        }
        Ok(())
    }

    fn flush_rx(&mut self) -> Result<(), RadioError> {
        self.set_state(ChipState::Idle)?;
        self.strobe(SFRX)?;
        Ok(())
    }

    /// Rising edge on GDO2 when the sync word is out, falling edge once the
    /// packet has been sent.
    fn wait_tx_complete(&mut self, timeout: Duration) -> Result<(), RadioError> {
        trace!("Waiting for sync to transmit");
        if !self.gdo2.wait_for_level(true, timeout)? {
            return Err(RadioError::TxTimeout("sync word transmission"));
        }
        trace!("Waiting for end of packet");
        if !self.gdo2.wait_for_level(false, timeout)? {
            return Err(RadioError::TxTimeout("end of packet"));
        }
        Ok(())
    }

    fn drain_rx_fifo(&mut self) -> Result<ReceivedPacket, RadioError> {
        let rxbytes = self.read_single(RXBYTES)?;
        trace!("RXBYTES: 0x{:02X}", rxbytes);

        if rxbytes & RXFIFO_OVERFLOW != 0 {
            return Err(RadioError::FifoOverflow);
        }

        let available = rxbytes & BYTES_IN_RXFIFO;
        if available == 0 {
            debug!("Interrupt with empty RX FIFO");
            return Ok(ReceivedPacket::default());
        }

        let length = self.read_single(RXFIFO)?;
        if length > MAX_PACKET_LENGTH {
            return Err(RadioError::InvalidLength(length));
        }
        debug!("Receiving {} bytes ({} in FIFO)", length, available);

        let payload = if length > 0 {
            self.read_burst(RXFIFO, length)?
        } else {
            Vec::new()
        };
        let status = self.read_burst(RXFIFO, 2)?;
        let quality = LinkQuality::from_status(status[0], status[1]);
        debug!(
            "Status RSSI: {} dBm, LQI: {}, CRC OK: {}",
            quality.rssi_dbm, quality.lqi, quality.crc_ok
        );

        Ok(ReceivedPacket {
            payload,
            quality: Some(quality),
        })
    }
}

/// Addresses shifted out for a burst read of `count` bytes.
///
/// Byte `i` addresses `register + 8 * i`; the leading byte's response is a
/// status byte and is dropped by the caller.
pub fn burst_read_addresses(register: u8, count: u8) -> Vec<u8> {
    (0..=count)
        .map(|i| register.wrapping_add(i.wrapping_mul(BURST_STRIDE)) | READ_BURST)
        .collect()
}

/// CC1101 transceiver driver
pub struct Cc1101<B, L> {
    link: Mutex<Link<B, L>>,
    config: RadioConfig,
    stats: Mutex<LinkStats>,
}

impl<B: Bus, L: InputLine> Cc1101<B, L> {
    /// Wrap a bus and the GDO2 line. No bus traffic happens until `start`.
    pub fn new(bus: B, gdo2: L, config: RadioConfig) -> Self {
        Self {
            link: Mutex::new(Link {
                bus,
                gdo2,
                state: ChipState::Idle,
                listening: false,
                settle_delay: config.settle_delay,
            }),
            config,
            stats: Mutex::new(LinkStats::default()),
        }
    }

    /// Create the driver and run the startup sequence
    pub fn open(bus: B, gdo2: L, config: RadioConfig) -> Result<Self, RadioError> {
        let radio = Self::new(bus, gdo2, config);
        radio.start()?;
        Ok(radio)
    }

    fn link(&self) -> MutexGuard<'_, Link<B, L>> {
        self.link
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn stats_mut(&self) -> MutexGuard<'_, LinkStats> {
        self.stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn config(&self) -> &RadioConfig {
        &self.config
    }

    pub fn stats(&self) -> LinkStats {
        *self.stats_mut()
    }

    /// State most recently strobed
    pub fn state(&self) -> ChipState {
        self.link().state
    }

    /// Reset, verify the silicon and write the configuration.
    ///
    /// A `HardwareMismatch` here means no usable chip is attached.
    pub fn start(&self) -> Result<(), RadioError> {
        info!("Initializing CC1101 radio");
        self.reset()?;
        self.self_test()?;
        self.init()?;
        info!("CC1101 radio initialized");
        Ok(())
    }

    pub fn strobe(&self, command: u8) -> Result<u8, RadioError> {
        self.link().strobe(command)
    }

    pub fn read_single(&self, register: u8) -> Result<u8, RadioError> {
        self.link().read_single(register)
    }

    pub fn write_single(&self, register: u8, value: u8) -> Result<(), RadioError> {
        self.link().write_single(register, value)
    }

    pub fn read_burst(&self, register: u8, count: u8) -> Result<Vec<u8>, RadioError> {
        self.link().read_burst(register, count)
    }

    pub fn write_burst(&self, register: u8, data: &[u8]) -> Result<(), RadioError> {
        self.link().write_burst(register, data)
    }

    pub fn reset(&self) -> Result<(), RadioError> {
        self.strobe(SRES)?;
        let mut link = self.link();
        link.state = ChipState::Idle;
        Ok(())
    }

    pub fn self_test(&self) -> Result<(), RadioError> {
        let mut link = self.link();
        let version = link.read_single(VERSION)?;
        let partnum = link.read_single(PARTNUM)?;
        info!("CC1101 version: 0x{:02X}, partnum: 0x{:02X}", version, partnum);

        if version != EXPECTED_VERSION || partnum != EXPECTED_PARTNUM {
            error!(
                "Self test failed: version 0x{:02X}, partnum 0x{:02X}",
                version, partnum
            );
            return Err(RadioError::HardwareMismatch { version, partnum });
        }
        Ok(())
    }

    /// Write the static register table and the configured sync word
    pub fn init(&self) -> Result<(), RadioError> {
        let mut link = self.link();
        for &(register, value) in INIT_REGISTERS {
            link.write_single(register, value)?;
        }
        let [hi, lo] = self.config.sync_word.to_be_bytes();
        link.write_single(SYNC1, hi)?;
        link.write_single(SYNC0, lo)?;
        debug!(
            "Wrote {} configuration registers, sync word 0x{:04X}",
            INIT_REGISTERS.len() + 2,
            self.config.sync_word
        );
        Ok(())
    }

    pub fn set_sync_word(&self, word: u16) -> Result<(), RadioError> {
        let mut link = self.link();
        let [hi, lo] = word.to_be_bytes();
        link.write_single(SYNC1, hi)?;
        link.write_single(SYNC0, lo)
    }

    pub fn set_idle(&self) -> Result<(), RadioError> {
        self.link().set_state(ChipState::Idle)
    }

    pub fn set_rx(&self) -> Result<(), RadioError> {
        self.link().set_state(ChipState::Rx)
    }

    pub fn set_tx(&self) -> Result<(), RadioError> {
        self.link().set_state(ChipState::Tx)
    }

    pub fn flush_rx(&self) -> Result<(), RadioError> {
        self.link().flush_rx()
    }

    /// Poll the chip status byte with a no-op strobe
    pub fn chip_status(&self) -> Result<ChipStatus, RadioError> {
        let status = self.strobe(SNOP)?;
        Ok(ChipStatus::from_byte(status))
    }

    /// Transmit one packet.
    ///
    /// Blocks until GDO2 signals the end of the packet or the configured
    /// timeout expires. The chip is returned to IDLE and the TX FIFO flushed
    /// on every path once TX has been entered.
    pub fn send(&self, payload: &[u8]) -> Result<(), RadioError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(RadioError::PacketTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD,
            });
        }

        let result = {
            let mut link = self.link();
            debug!("Sending packet: {}", hex::encode(payload));
            Self::transmit(&mut link, payload, self.config.tx_timeout)
        };

        let mut stats = self.stats_mut();
        match &result {
            Ok(()) => stats.packets_sent += 1,
            Err(e) => {
                stats.send_failures += 1;
                warn!("Send failed: {}", e);
            }
        }
        result
    }

    fn transmit(
        link: &mut Link<B, L>,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<(), RadioError> {
        link.write_single(TXFIFO, payload.len() as u8)?;
        if !payload.is_empty() {
            link.write_burst(TXFIFO, payload)?;
        }
        link.set_state(ChipState::Tx)?;

        let started = Instant::now();
        let waited = link.wait_tx_complete(timeout);
        trace!("TX wait finished after {:?}", started.elapsed());

        let idle = link.set_state(ChipState::Idle);
        let flushed = link.strobe(SFTX);
        waited?;
        idle?;
        flushed?;

        if link.listening {
            link.set_state(ChipState::Rx)?;
        }
        Ok(())
    }

    /// Drain one packet from the RX FIFO.
    ///
    /// Called after GDO0 signals a packet. The RX FIFO is flushed on every
    /// exit path, including overflow and read errors.
    pub fn receive(&self) -> Result<ReceivedPacket, RadioError> {
        let result = {
            let mut link = self.link();
            let drained = link.drain_rx_fifo();
            let flushed = link.flush_rx();
            match (drained, flushed) {
                (Err(e), _) => Err(e),
                (Ok(_), Err(e)) => Err(e),
                (Ok(packet), Ok(())) => Ok(packet),
            }
        };

        let mut stats = self.stats_mut();
        match &result {
            Ok(packet) if !packet.is_empty() => {
                stats.packets_received += 1;
                stats.last_rssi_dbm = packet.quality.map(|q| q.rssi_dbm);
            }
            Err(RadioError::FifoOverflow) => stats.fifo_overflows += 1,
            _ => {}
        }
        result
    }

    /// Issue the reset strobe, leaving the chip unconfigured
    pub fn close(&self) -> Result<(), RadioError> {
        info!("Shutting down CC1101 radio");
        let mut link = self.link();
        link.listening = false;
        link.strobe(SRES)?;
        link.state = ChipState::Idle;
        Ok(())
    }
}

/// Handle of a running receive loop
pub struct ReceiverHandle {
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ReceiverHandle {
    /// Signal the loop and wait for it to exit
    pub fn stop(mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Receiver thread panicked");
            }
        }
    }
}

impl Drop for ReceiverHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

impl<B, L> Cc1101<B, L>
where
    B: Bus + 'static,
    L: InputLine + 'static,
{
    /// Enter RX and forward every packet signalled on GDO0 to `packets`.
    ///
    /// Runs on its own thread until the handle is stopped or the channel
    /// closes. After each packet the chip is re-armed IDLE -> RX.
    pub fn spawn_receiver<G>(
        self: &Arc<Self>,
        mut gdo0: G,
        packets: mpsc::Sender<ReceivedPacket>,
    ) -> Result<ReceiverHandle, RadioError>
    where
        G: InputLine + 'static,
    {
        {
            let mut link = self.link();
            link.set_state(ChipState::Idle)?;
            link.set_state(ChipState::Rx)?;
            link.listening = true;
        }
        info!("Waiting for packets...");

        let radio = Arc::clone(self);
        let shutdown = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&shutdown);

        let thread = thread::Builder::new()
            .name("cc1101-rx".to_string())
            .spawn(move || {
                while !stop.load(Ordering::SeqCst) {
                    match gdo0.wait_for_edge(EdgeType::Rising, RECEIVER_POLL_INTERVAL) {
                        Ok(false) => continue,
                        Ok(true) => {}
                        Err(e) => {
                            error!("GDO0 wait failed: {}", e);
                            thread::sleep(RECEIVER_POLL_INTERVAL);
                            continue;
                        }
                    }

                    debug!("Packet arrived");
                    match radio.receive() {
                        Ok(packet) if packet.is_empty() => {}
                        Ok(packet) => {
                            if packets.blocking_send(packet).is_err() {
                                info!("Packet channel closed, stopping receiver");
                                break;
                            }
                        }
                        Err(RadioError::FifoOverflow) => warn!("RX FIFO overflow, packet lost"),
                        Err(e) => error!("Failed to receive: {}", e),
                    }

                    let mut link = radio.link();
                    if let Err(e) = link
                        .set_state(ChipState::Idle)
                        .and_then(|_| link.set_state(ChipState::Rx))
                    {
                        error!("Failed to re-enter RX: {}", e);
                    }
                }
                radio.link().listening = false;
                debug!("Receiver stopped");
            })
            .map_err(|e| RadioError::Worker(e.to_string()))?;

        Ok(ReceiverHandle {
            shutdown,
            thread: Some(thread),
        })
    }
}
