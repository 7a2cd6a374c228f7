//! # GSI Hardware Interface
//!
//! Register-level access the GSI transport needs. The transport owns the
//! rings and transaction bookkeeping; an implementation of
//! [`GsiHardware`] programs channel contexts, issues channel commands,
//! writes doorbells and reads back the event ring.

use core::fmt;

use ipa_core::{ChannelId, DmaAddr, Result};

/// Most channels a GSI instance implements
pub const GSI_CHANNEL_COUNT_MAX: usize = 17;

/// Deepest descriptor FIFO of any channel
pub const GSI_TLV_MAX: u32 = 64;

/// Channel state machine commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelCommand {
    /// Claim the channel context
    Allocate,
    /// Begin fetching ring elements
    Start,
    /// Stop fetching; may report [`ipa_core::Error::Busy`] while draining
    Stop,
    /// Return the channel to its allocated state
    Reset,
    /// Release the channel context
    DeAllocate,
}

impl fmt::Display for ChannelCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Allocate => "allocate",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Reset => "reset",
            Self::DeAllocate => "de-allocate",
        };
        f.write_str(name)
    }
}

/// Transfer completion read from a channel's event ring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GsiEvent {
    /// Ring index of the last element of the finished transfer
    pub tre_index: u32,
    /// Bytes transferred
    pub len: u32,
}

/// GSI register interface
pub trait GsiHardware: Send + Sync {
    /// Write a channel context: ring base, geometry and whether the
    /// doorbell engine is enabled
    fn channel_program(
        &self,
        channel_id: ChannelId,
        ring: DmaAddr,
        tre_count: u32,
        event_count: u32,
        doorbell: bool,
    ) -> Result<()>;

    /// Issue a channel command and wait for it to take effect
    fn channel_command(&self, channel_id: ChannelId, command: ChannelCommand) -> Result<()>;

    /// Tell hardware elements up to `index` are ready
    fn ring_doorbell(&self, channel_id: ChannelId, index: u32);

    /// Next unread completion event
    fn next_event(&self, channel_id: ChannelId) -> Option<GsiEvent>;

    /// Mask or unmask a channel's completion interrupt
    fn irq_enable(&self, channel_id: ChannelId, enable: bool);
}
