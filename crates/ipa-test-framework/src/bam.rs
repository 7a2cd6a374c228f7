//! # Mock DMA Engine
//!
//! Slave DMA engine stand-in for the BAM transport. Pipes are looked up by
//! name; each prepared descriptor gets the next cookie and stays in
//! progress until the test finishes it, or immediately in auto-complete
//! mode.

use std::collections::BTreeMap;
use std::string::{String, ToString};
use std::vec::Vec;

use spin::Mutex;

use ipa_bam::{DmaEngine, DmaStatus, PrepFlags, SlaveConfig, TransferDirection, TxState};
use ipa_core::{DmaAddr, Error, Result};

/// Pipe handle; index into the requested pipe table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MockChan(pub u32);

/// One prepared descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreparedDesc {
    /// Pipe
    pub chan: MockChan,
    /// Cookie handed back
    pub cookie: u32,
    /// Buffer or payload address
    pub addr: DmaAddr,
    /// Length, or the opcode for immediate commands
    pub len: u32,
    /// Transfer direction
    pub direction: TransferDirection,
    /// Preparation flags
    pub flags: PrepFlags,
}

#[derive(Debug, Default)]
struct EngineState {
    pipes: Vec<String>,
    configs: Vec<(MockChan, SlaveConfig)>,
    prepared: Vec<PreparedDesc>,
    status: BTreeMap<u32, TxState>,
    issued: u32,
    released: Vec<MockChan>,
    terminated: Vec<MockChan>,
    missing: Vec<String>,
    auto_complete: bool,
    fail_prep: bool,
}

/// Recording slave DMA engine
#[derive(Debug, Default)]
pub struct MockDmaEngine {
    state: Mutex<EngineState>,
}

impl MockDmaEngine {
    /// Create an engine offering every pipe name
    pub fn new() -> Self {
        Self::default()
    }

    /// Make requests for pipe `name` fail
    pub fn remove_pipe(&self, name: &str) {
        self.state.lock().missing.push(name.to_string());
    }

    /// Complete every descriptor as soon as it is prepared
    pub fn set_auto_complete(&self, enable: bool) {
        self.state.lock().auto_complete = enable;
    }

    /// Fail every preparation from now on
    pub fn set_fail_prep(&self, fail: bool) {
        self.state.lock().fail_prep = fail;
    }

    /// Set the status of the descriptor holding `cookie`
    pub fn finish(&self, cookie: u32, status: DmaStatus, residue: u32) {
        self.state
            .lock()
            .status
            .insert(cookie, TxState { status, residue });
    }

    /// Complete every descriptor prepared on `chan` so far
    pub fn finish_all(&self, chan: MockChan) {
        let mut state = self.state.lock();
        let cookies: Vec<u32> = state
            .prepared
            .iter()
            .filter(|desc| desc.chan == chan)
            .map(|desc| desc.cookie)
            .collect();
        for cookie in cookies {
            state.status.entry(cookie).or_insert(TxState {
                status: DmaStatus::Complete,
                residue: 0,
            });
        }
    }

    /// Pipe requested under `name`
    pub fn pipe(&self, name: &str) -> Option<MockChan> {
        self.state
            .lock()
            .pipes
            .iter()
            .position(|pipe| pipe == name)
            .map(|index| MockChan(index as u32))
    }

    /// Descriptors in preparation order
    pub fn prepared(&self) -> Vec<PreparedDesc> {
        self.state.lock().prepared.clone()
    }

    /// Configurations applied, in order
    pub fn configs(&self) -> Vec<(MockChan, SlaveConfig)> {
        self.state.lock().configs.clone()
    }

    /// Calls to `issue_pending`
    pub fn issued(&self) -> u32 {
        self.state.lock().issued
    }

    /// Pipes released
    pub fn released(&self) -> Vec<MockChan> {
        self.state.lock().released.clone()
    }

    /// Pipes terminated
    pub fn terminated(&self) -> Vec<MockChan> {
        self.state.lock().terminated.clone()
    }
}

impl DmaEngine for MockDmaEngine {
    type Chan = MockChan;

    fn request_channel(&self, name: &str) -> Result<MockChan> {
        let mut state = self.state.lock();
        if state.missing.iter().any(|missing| missing == name) {
            return Err(Error::HardwareUnsupported);
        }
        state.pipes.push(name.to_string());
        Ok(MockChan(state.pipes.len() as u32 - 1))
    }

    fn release_channel(&self, chan: MockChan) {
        self.state.lock().released.push(chan);
    }

    fn slave_config(&self, chan: MockChan, config: &SlaveConfig) -> Result<()> {
        self.state.lock().configs.push((chan, *config));
        Ok(())
    }

    fn prep_slave_single(
        &self,
        chan: MockChan,
        addr: DmaAddr,
        len: u32,
        direction: TransferDirection,
        flags: PrepFlags,
    ) -> Result<u32> {
        let mut state = self.state.lock();
        if state.fail_prep {
            return Err(Error::OutOfMemory);
        }

        let cookie = state.prepared.len() as u32 + 1;
        state.prepared.push(PreparedDesc {
            chan,
            cookie,
            addr,
            len,
            direction,
            flags,
        });
        if state.auto_complete {
            state.status.insert(
                cookie,
                TxState {
                    status: DmaStatus::Complete,
                    residue: 0,
                },
            );
        }
        Ok(cookie)
    }

    fn issue_pending(&self, _chan: MockChan) {
        self.state.lock().issued += 1;
    }

    fn tx_status(&self, _chan: MockChan, cookie: u32) -> TxState {
        self.state
            .lock()
            .status
            .get(&cookie)
            .copied()
            .unwrap_or(TxState {
                status: DmaStatus::InProgress,
                residue: 0,
            })
    }

    fn terminate_sync(&self, chan: MockChan) {
        self.state.lock().terminated.push(chan);
    }
}
