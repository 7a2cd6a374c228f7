//! # DMA Engine Interface
//!
//! The slave-DMA services a BAM controller driver exposes. Each IPA pipe
//! is one engine channel; every descriptor is prepared and submitted
//! separately and identified by a cookie.

use core::fmt;

use ipa_core::{DmaAddr, Result};

/// Largest burst a BAM pipe accepts, in descriptors
pub const BAM_MAX_BURST_SIZE: u32 = 16;

/// Transfer direction relative to host memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    /// Host memory to the IPA
    MemToDev,
    /// IPA to host memory
    DevToMem,
}

/// Channel configuration applied before any transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaveConfig {
    /// Transfer direction
    pub direction: TransferDirection,
    /// Burst size on the device side
    pub max_burst: u32,
}

bitflags::bitflags! {
    /// Descriptor preparation flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PrepFlags: u32 {
        /// Raise the completion callback when this descriptor finishes
        const INTERRUPT = 1 << 0;
        /// Descriptor carries an immediate command; length is the opcode
        const IMM_CMD = 1 << 1;
    }
}

/// Progress of a submitted descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaStatus {
    /// Finished
    Complete,
    /// Still queued or running
    InProgress,
    /// Engine reported a failure
    Error,
}

/// Status of a submitted descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxState {
    /// Progress
    pub status: DmaStatus,
    /// Bytes not transferred
    pub residue: u32,
}

/// Slave DMA engine
pub trait DmaEngine: Send + Sync {
    /// Engine channel handle
    type Chan: Copy + Send + Sync + fmt::Debug;

    /// Look up a channel by its firmware name
    fn request_channel(&self, name: &str) -> Result<Self::Chan>;

    /// Undo [`DmaEngine::request_channel`]
    fn release_channel(&self, chan: Self::Chan);

    /// Apply direction and burst configuration
    fn slave_config(&self, chan: Self::Chan, config: &SlaveConfig) -> Result<()>;

    /// Prepare and submit one descriptor, returning its cookie.
    ///
    /// Cookies are never zero.
    fn prep_slave_single(
        &self,
        chan: Self::Chan,
        addr: DmaAddr,
        len: u32,
        direction: TransferDirection,
        flags: PrepFlags,
    ) -> Result<u32>;

    /// Start everything submitted so far
    fn issue_pending(&self, chan: Self::Chan);

    /// Query a submitted descriptor
    fn tx_status(&self, chan: Self::Chan, cookie: u32) -> TxState;

    /// Abort all descriptors and wait for the channel to go idle
    fn terminate_sync(&self, chan: Self::Chan);
}
