//! # Transactions
//!
//! A transaction is a pooled, reference-counted unit of work: an ordered
//! list of fragments (and for command transactions one opcode record per
//! fragment) submitted to hardware as one descriptor chain.
//!
//! ```text
//!  alloc ──► ALLOCATED ──commit──► PENDING ──update──► COMPLETED
//!                │                                        │
//!              drop                                     poll
//!                │                                        ▼
//!                └──────────────► (freed) ◄──finalize── POLLED
//! ```
//!
//! Callers hold a [`Trans`] handle while the transaction is allocated.
//! Committing consumes the handle; dropping it uncommitted frees the
//! transaction and undoes any mappings it made.

use core::fmt;
use core::mem::ManuallyDrop;
use core::sync::atomic::{AtomicBool, Ordering};

use spin::Mutex;

use ipa_core::{
    ChannelId, Completion, DmaAddr, DmaDirection, Error, HostBuffer, Opcode, RefCount, Result,
};

use crate::channel::Channel;
use crate::pool::{DmaSlot, Recycle};
use crate::transport::Transport;

// =============================================================================
// IDENTIFIERS & RECORDS
// =============================================================================

/// Transaction slot within its channel's transaction pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct TransId(u32);

impl TransId {
    /// Create from a raw slot index
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Raw slot index
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

/// One fragment of a transaction
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Fragment {
    pub(crate) addr: DmaAddr,
    pub(crate) len: u32,
    /// Mapped by the transaction itself, unmapped on completion
    pub(crate) mapped: bool,
}

/// Per-fragment command record
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct CmdInfo {
    pub(crate) opcode: Opcode,
    pub(crate) direction: DmaDirection,
    /// Payload slot owned by this fragment
    pub(crate) payload: Option<DmaSlot>,
}

/// Mutable transaction fields
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TransState {
    /// Fragments reserved
    pub(crate) tre_count: u32,
    /// Fragments filled
    pub(crate) used: u32,
    pub(crate) direction: DmaDirection,
    /// First fragment slot
    pub(crate) sg_index: u32,
    /// First command record slot (command transactions only)
    pub(crate) info_index: Option<u32>,
    /// Committed bytes (transmit) or transferred bytes (receive)
    pub(crate) len: u32,
    /// Channel byte count when committed (transmit)
    pub(crate) byte_count: u64,
    /// Channel transaction count when committed (transmit)
    pub(crate) trans_count: u64,
    /// Backend cookie recorded at submission
    pub(crate) cookie: u32,
}

/// Pooled transaction storage
#[derive(Debug, Default)]
pub(crate) struct TransSlot {
    pub(crate) state: Mutex<TransState>,
    pub(crate) refcount: RefCount,
    pub(crate) completion: Completion,
    pub(crate) cancelled: AtomicBool,
}

impl Recycle for TransSlot {
    fn recycle(&self) {
        *self.state.lock() = TransState::default();
        self.refcount.set(0);
        self.completion.reinit();
        self.cancelled.store(false, Ordering::Release);
    }
}

// =============================================================================
// TRANSACTION HANDLE
// =============================================================================

/// An allocated, not yet committed transaction
pub struct Trans<'a, T: Transport + ?Sized> {
    transport: &'a T,
    channel: &'a Channel,
    id: TransId,
}

impl<'a, T: Transport + ?Sized> Trans<'a, T> {
    pub(crate) fn new(transport: &'a T, channel: &'a Channel, id: TransId) -> Self {
        Self {
            transport,
            channel,
            id,
        }
    }

    /// Transaction slot
    #[inline]
    pub fn id(&self) -> TransId {
        self.id
    }

    /// Owning channel
    #[inline]
    pub fn channel_id(&self) -> ChannelId {
        self.channel.id()
    }

    /// Fragments reserved at allocation
    pub fn tre_count(&self) -> u32 {
        self.channel.trans_state(self.id).tre_count
    }

    /// Fragments filled so far
    pub fn used(&self) -> u32 {
        self.channel.trans_state(self.id).used
    }

    /// DMA direction of data fragments
    pub fn direction(&self) -> DmaDirection {
        self.channel.trans_state(self.id).direction
    }

    /// Map a host buffer in the transaction direction and append it
    pub fn add_fragment(&mut self, buf: HostBuffer) -> Result<()> {
        let state = self.channel.trans_state(self.id);
        if state.used >= state.tre_count {
            log::error!(
                "channel {}: transaction {:?} has no fragment left",
                self.channel.id(),
                self.id
            );
            return Err(Error::TooManyFragments);
        }
        if !state.direction.is_mapped() {
            log::error!(
                "channel {}: data fragment on an unmapped transaction",
                self.channel.id()
            );
            return Err(Error::InvalidParameter);
        }

        let platform = self.channel.platform();
        let addr = platform.map_single(buf, state.direction).map_err(|err| {
            log::error!("channel {}: mapping failed: {}", self.channel.id(), err);
            Error::MappingFailed
        })?;

        let fragment = Fragment {
            addr,
            len: buf.len,
            mapped: true,
        };
        self.channel
            .trans_push(self.id, fragment, None)
            .map_err(|err| {
                platform.unmap_single(addr, buf.len, state.direction);
                err
            })
    }

    /// Append a region the caller already mapped
    pub fn add_mapped(&mut self, addr: DmaAddr, len: u32) -> Result<()> {
        let fragment = Fragment {
            addr,
            len,
            mapped: false,
        };
        self.channel.trans_push(self.id, fragment, None)
    }

    /// Append an immediate command payload held in coherent memory
    pub fn add_command(
        &mut self,
        addr: DmaAddr,
        len: u32,
        direction: DmaDirection,
        opcode: Opcode,
    ) -> Result<()> {
        let fragment = Fragment {
            addr,
            len,
            mapped: false,
        };
        let info = CmdInfo {
            opcode,
            direction,
            payload: None,
        };
        self.channel.trans_push(self.id, fragment, Some(info))
    }

    /// Copy an encoded command into the payload slot of the next fragment.
    ///
    /// The slot belongs to the transaction and returns to the command pool
    /// when the transaction is freed. Calling this again before the next
    /// [`add_command`](Self::add_command) rewrites the same slot.
    pub fn payload_alloc(&self, bytes: &[u8]) -> Result<DmaAddr> {
        self.channel.cmd_payload_alloc(self.id, bytes)
    }

    /// Submit and ring the doorbell
    pub fn commit(self) {
        let (transport, channel, id) = self.into_parts();
        channel.trans_commit(transport, id, true);
    }

    /// Submit, leaving the doorbell to a later commit or to ring exhaustion
    pub fn commit_batched(self) {
        let (transport, channel, id) = self.into_parts();
        channel.trans_commit(transport, id, false);
    }

    /// Submit and block until the transaction completes
    pub fn commit_wait(self) {
        let (transport, channel, id) = self.into_parts();
        if channel.trans_state(id).used == 0 {
            channel.trans_free(id);
            return;
        }

        let slot = channel.slot(id);
        slot.refcount.inc();
        channel.trans_commit(transport, id, true);
        slot.completion.wait();
        channel.trans_free(id);
    }

    /// Submit and block until the transaction completes or `timeout_ms`
    /// elapses.
    ///
    /// A timeout does not retract the hardware work; the transaction is
    /// freed by the completion path once hardware finishes it.
    pub fn commit_wait_timeout(self, timeout_ms: u32) -> Result<()> {
        let (transport, channel, id) = self.into_parts();
        if channel.trans_state(id).used == 0 {
            channel.trans_free(id);
            return Ok(());
        }

        let slot = channel.slot(id);
        slot.refcount.inc();
        channel.trans_commit(transport, id, true);

        let platform = channel.platform();
        let done = slot
            .completion
            .wait_timeout(u64::from(timeout_ms) * 1_000_000, || platform.time_ns());
        channel.trans_free(id);

        if done {
            Ok(())
        } else {
            log::warn!(
                "channel {}: transaction {:?} timed out after {} ms",
                channel.id(),
                id,
                timeout_ms
            );
            Err(Error::Timeout)
        }
    }

    fn into_parts(self) -> (&'a T, &'a Channel, TransId) {
        let this = ManuallyDrop::new(self);
        (this.transport, this.channel, this.id)
    }
}

impl<T: Transport + ?Sized> Drop for Trans<'_, T> {
    fn drop(&mut self) {
        self.channel.trans_abandon(self.id);
    }
}

impl<T: Transport + ?Sized> fmt::Debug for Trans<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trans")
            .field("channel", &self.channel.id())
            .field("id", &self.id)
            .finish()
    }
}
