//! Mock bus and input line implementations for testing
//!
//! These let the CC1101 driver run without hardware. The bus records every
//! transaction and answers from per-address response queues; the line replays
//! a scripted sequence of levels.

use super::{Bus, HalError, InputLine};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct BusState {
    /// Bytes written by each transaction, in order
    transactions: Vec<Vec<u8>>,
    /// Responses keyed by the first (address) byte of a transaction
    responses: HashMap<u8, VecDeque<Vec<u8>>>,
    /// Address bytes whose next transaction fails
    failures: HashMap<u8, usize>,
}

/// Mock register bus that records transactions.
///
/// Clones share state, so a test can keep one handle while the driver owns
/// another.
#[derive(Clone, Default)]
pub struct MockBus {
    state: Arc<Mutex<BusState>>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, BusState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a response for the next transaction starting with `address`.
    ///
    /// The response is copied over the transaction buffer; bytes beyond its
    /// length read back as zero.
    pub fn queue_response(&self, address: u8, response: &[u8]) {
        self.state()
            .responses
            .entry(address)
            .or_default()
            .push_back(response.to_vec());
    }

    /// Make the next transaction starting with `address` fail
    pub fn fail_on(&self, address: u8) {
        *self.state().failures.entry(address).or_default() += 1;
    }

    /// Bytes written by every transaction so far
    pub fn transactions(&self) -> Vec<Vec<u8>> {
        self.state().transactions.clone()
    }

    /// First byte of every transaction so far
    pub fn addresses(&self) -> Vec<u8> {
        self.state()
            .transactions
            .iter()
            .filter_map(|t| t.first().copied())
            .collect()
    }
}

impl Bus for MockBus {
    fn transfer(&mut self, buf: &mut [u8]) -> Result<(), HalError> {
        let mut state = self.state();
        state.transactions.push(buf.to_vec());

        let Some(&address) = buf.first() else {
            return Ok(());
        };

        if let Some(pending) = state.failures.get_mut(&address) {
            if *pending > 0 {
                *pending -= 1;
                return Err(HalError::Spi(format!(
                    "injected failure on 0x{address:02X}"
                )));
            }
        }

        let response = state
            .responses
            .get_mut(&address)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_default();
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = response.get(i).copied().unwrap_or(0);
        }
        Ok(())
    }
}

#[derive(Default)]
struct LineState {
    levels: VecDeque<bool>,
    idle_level: bool,
    reads: usize,
}

/// Mock input line replaying scripted levels.
///
/// Once the script runs out the line holds its idle level.
#[derive(Clone, Default)]
pub struct MockLine {
    state: Arc<Mutex<LineState>>,
}

impl MockLine {
    /// A line that stays low until levels are scripted
    pub fn new() -> Self {
        Self::default()
    }

    /// A line that plays `levels` and then holds `idle_level`
    pub fn scripted(levels: &[bool], idle_level: bool) -> Self {
        let line = Self::new();
        {
            let mut state = line.state();
            state.levels.extend(levels.iter().copied());
            state.idle_level = idle_level;
        }
        line
    }

    /// A line that pulses high once (sync sent) and then falls (packet sent)
    pub fn tx_pulse() -> Self {
        Self::scripted(&[true, false], false)
    }

    fn state(&self) -> MutexGuard<'_, LineState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of level samples taken so far
    pub fn reads(&self) -> usize {
        self.state().reads
    }
}

impl InputLine for MockLine {
    fn is_high(&mut self) -> Result<bool, HalError> {
        let mut state = self.state();
        state.reads += 1;
        let idle = state.idle_level;
        Ok(state.levels.pop_front().unwrap_or(idle))
    }
}
