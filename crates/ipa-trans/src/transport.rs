//! # Transport Capability
//!
//! The contract between the transaction engine and a hardware backend.
//!
//! A backend owns a [`TransportBase`] holding its channels and implements
//! [`Transport`]: channel control plus the two data-path hooks, `submit`
//! (hand a committed transaction's descriptors to hardware) and
//! `channel_update` (report the newest transaction hardware finished).
//! Everything above that, from allocation to polling, comes from the
//! blanket [`TransportExt`] implementation.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use spin::{Mutex, MutexGuard};

use ipa_core::{
    ChannelId, DmaAddr, DmaDirection, Error, IpaVersion, Opcode, Result, IPA_CHANNEL_COUNT_MAX,
};
use ipa_hal::DmaPlatform;

use crate::channel::{Channel, ChannelConfig};
use crate::client::TransClient;
use crate::trans::{Trans, TransId};

// =============================================================================
// DESCRIPTOR
// =============================================================================

/// One hardware descriptor of a committed transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    /// Device address of the fragment
    pub addr: DmaAddr,
    /// Fragment length in bytes
    pub len: u32,
    /// Immediate command opcode, [`Opcode::NONE`] for data
    pub opcode: Opcode,
    /// Command payload direction, or the transaction direction for data
    pub direction: DmaDirection,
    /// Final descriptor; requests the completion interrupt
    pub last: bool,
}

impl Descriptor {
    /// Whether the descriptor carries an immediate command
    #[inline]
    pub fn is_command(&self) -> bool {
        !self.opcode.is_none()
    }
}

// =============================================================================
// TRANSPORT BASE
// =============================================================================

/// State shared by every backend
pub struct TransportBase {
    version: IpaVersion,
    platform: Arc<dyn DmaPlatform>,
    channels: Vec<Option<Channel>>,
    lock: Mutex<()>,
}

impl TransportBase {
    /// Create an empty channel table
    pub fn new(version: IpaVersion, platform: Arc<dyn DmaPlatform>) -> Self {
        Self {
            version,
            platform,
            channels: (0..IPA_CHANNEL_COUNT_MAX).map(|_| None).collect(),
            lock: Mutex::new(()),
        }
    }

    /// Hardware version
    #[inline]
    pub fn version(&self) -> IpaVersion {
        self.version
    }

    /// Platform shared with every channel
    #[inline]
    pub fn platform(&self) -> &Arc<dyn DmaPlatform> {
        &self.platform
    }

    /// Create and register a channel
    pub fn add_channel(&mut self, config: ChannelConfig) -> Result<&Channel> {
        let index = config.id.index();
        let Some(entry) = self.channels.get_mut(index) else {
            log::error!("transport: channel {} out of range", config.id);
            return Err(Error::InvalidParameter);
        };
        if entry.is_some() {
            log::error!("transport: channel {} defined twice", config.id);
            return Err(Error::InvalidState);
        }

        Ok(entry.insert(Channel::new(self.platform.clone(), config)?))
    }

    /// Look up a channel
    pub fn channel(&self, id: ChannelId) -> Result<&Channel> {
        self.channels
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(Error::ChannelNotFound(id.raw()))
    }

    /// Registered channels in id order
    pub fn channels(&self) -> impl Iterator<Item = &Channel> + '_ {
        self.channels.iter().filter_map(Option::as_ref)
    }

    /// Release every channel and its pools
    pub fn clear(&mut self) {
        for entry in &mut self.channels {
            *entry = None;
        }
    }

    /// Serialize control operations
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock()
    }
}

impl fmt::Debug for TransportBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportBase")
            .field("version", &self.version)
            .field("platform", &self.platform.name())
            .field("channels", &self.channels().count())
            .finish()
    }
}

// =============================================================================
// TRANSPORT TRAIT
// =============================================================================

/// Hardware transport backend
pub trait Transport: Send + Sync {
    /// Shared channel state
    fn base(&self) -> &TransportBase;

    /// Program the hardware for every channel
    fn setup(&self) -> Result<()>;

    /// Undo [`Transport::setup`]
    fn teardown(&self);

    /// Release every channel; the transport is unusable afterwards
    fn exit(&mut self);

    /// Descriptors a channel can have outstanding
    fn channel_tre_max(&self, channel_id: ChannelId) -> u32 {
        self.base().channel(channel_id).map_or(0, Channel::tre_max)
    }

    /// Most descriptors in one transaction on a channel
    fn channel_trans_tre_max(&self, channel_id: ChannelId) -> u32 {
        self.base()
            .channel(channel_id)
            .map_or(0, Channel::trans_tre_max)
    }

    /// Start a channel
    fn channel_start(&self, channel_id: ChannelId) -> Result<()>;

    /// Stop a channel
    fn channel_stop(&self, channel_id: ChannelId) -> Result<()>;

    /// Reset a channel, cancelling its pending transactions
    fn channel_reset(&self, channel_id: ChannelId, doorbell: bool);

    /// Quiesce a channel, optionally stopping it
    fn channel_suspend(&self, channel_id: ChannelId, stop: bool) -> Result<()>;

    /// Undo [`Transport::channel_suspend`]
    fn channel_resume(&self, channel_id: ChannelId, start: bool) -> Result<()>;

    /// Hand a committed transaction's descriptors to hardware
    fn submit(&self, channel: &Channel, id: TransId, descriptors: &[Descriptor], ring_db: bool);

    /// Report the newest transaction hardware finished, if any
    fn channel_update(&self, channel: &Channel) -> Option<TransId>;
}

// =============================================================================
// TRANSACTION API
// =============================================================================

/// Transaction operations available on every transport
pub trait TransportExt: Transport {
    /// Allocate a data transaction of `tre_count` fragments
    fn channel_trans_alloc(
        &self,
        channel_id: ChannelId,
        tre_count: u32,
        direction: DmaDirection,
    ) -> Result<Trans<'_, Self>> {
        let channel = self.base().channel(channel_id)?;
        let id = channel.trans_alloc(tre_count, direction, false)?;
        Ok(Trans::new(self, channel, id))
    }

    /// Allocate a command transaction of `tre_count` commands
    fn cmd_trans_alloc(&self, channel_id: ChannelId, tre_count: u32) -> Result<Trans<'_, Self>> {
        let channel = self.base().channel(channel_id)?;
        let id = channel.trans_alloc(tre_count, DmaDirection::None, true)?;
        Ok(Trans::new(self, channel, id))
    }

    /// Finalize up to `budget` completed transactions on a channel
    fn channel_poll(&self, channel_id: ChannelId, budget: u32) -> Result<u32> {
        let channel = self.base().channel(channel_id)?;
        Ok(channel.poll(self, budget))
    }

    /// Bind the upper-layer client of a channel
    fn channel_set_client(
        &self,
        channel_id: ChannelId,
        client: Arc<dyn TransClient>,
    ) -> Result<()> {
        self.base().channel(channel_id)?.set_client(client)
    }
}

impl<T: Transport + ?Sized> TransportExt for T {}
