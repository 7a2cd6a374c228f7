//! # Transport Selection
//!
//! The hardware version fixes the transport once, at initialization:
//! v2.x fronts a BAM DMA engine, v3.0 and later GSI rings. [`Backend`]
//! is that closed choice; it implements [`Transport`] by forwarding to
//! the variant it holds.

use alloc::sync::Arc;
use core::fmt;

use ipa_bam::{BamTransport, DmaEngine};
use ipa_core::{ChannelId, Error, IpaVersion, Result, TransportKind};
use ipa_gsi::{GsiHardware, GsiTransport};
use ipa_hal::DmaPlatform;
use ipa_trans::{Channel, Descriptor, EndpointData, TransId, Transport, TransportBase};

/// Hardware interface handed to [`Backend::new`]
#[derive(Debug)]
pub enum Hardware<H, E> {
    /// GSI register interface
    Gsi(H),
    /// BAM DMA engine
    Bam(E),
}

impl<H, E> Hardware<H, E> {
    /// Transport this interface drives
    pub fn kind(&self) -> TransportKind {
        match self {
            Self::Gsi(_) => TransportKind::Gsi,
            Self::Bam(_) => TransportKind::Bam,
        }
    }
}

/// The transport of one IPA instance
pub enum Backend<H: GsiHardware, E: DmaEngine> {
    /// GSI rings
    Gsi(GsiTransport<H>),
    /// BAM pipes
    Bam(BamTransport<E>),
}

impl<H: GsiHardware, E: DmaEngine> Backend<H, E> {
    /// Build the transport `version` requires from `hardware`
    pub fn new(
        version: IpaVersion,
        platform: Arc<dyn DmaPlatform>,
        hardware: Hardware<H, E>,
        data: &[EndpointData],
    ) -> Result<Self> {
        let kind = version.transport_kind();
        if hardware.kind() != kind {
            log::error!(
                "backend: IPA {} needs {:?} hardware, got {:?}",
                version,
                kind,
                hardware.kind()
            );
            return Err(Error::InvalidParameter);
        }

        match hardware {
            Hardware::Gsi(hw) => Ok(Self::Gsi(GsiTransport::new(version, platform, hw, data)?)),
            Hardware::Bam(engine) => Ok(Self::Bam(BamTransport::new(
                version, platform, engine, data,
            )?)),
        }
    }

    /// Transport in use
    pub fn kind(&self) -> TransportKind {
        match self {
            Self::Gsi(_) => TransportKind::Gsi,
            Self::Bam(_) => TransportKind::Bam,
        }
    }

    /// GSI transport, if that is the one in use
    pub fn as_gsi(&self) -> Option<&GsiTransport<H>> {
        match self {
            Self::Gsi(gsi) => Some(gsi),
            Self::Bam(_) => None,
        }
    }

    /// BAM transport, if that is the one in use
    pub fn as_bam(&self) -> Option<&BamTransport<E>> {
        match self {
            Self::Gsi(_) => None,
            Self::Bam(bam) => Some(bam),
        }
    }

    /// Completion interrupt or callback for a channel; schedules its poller
    pub fn irq(&self, channel_id: ChannelId) -> bool {
        match self {
            Self::Gsi(gsi) => gsi.irq(channel_id),
            Self::Bam(bam) => bam.irq(channel_id),
        }
    }
}

impl<H: GsiHardware, E: DmaEngine> Transport for Backend<H, E> {
    fn base(&self) -> &TransportBase {
        match self {
            Self::Gsi(gsi) => gsi.base(),
            Self::Bam(bam) => bam.base(),
        }
    }

    fn setup(&self) -> Result<()> {
        match self {
            Self::Gsi(gsi) => gsi.setup(),
            Self::Bam(bam) => bam.setup(),
        }
    }

    fn teardown(&self) {
        match self {
            Self::Gsi(gsi) => gsi.teardown(),
            Self::Bam(bam) => bam.teardown(),
        }
    }

    fn exit(&mut self) {
        match self {
            Self::Gsi(gsi) => gsi.exit(),
            Self::Bam(bam) => bam.exit(),
        }
    }

    fn channel_tre_max(&self, channel_id: ChannelId) -> u32 {
        match self {
            Self::Gsi(gsi) => gsi.channel_tre_max(channel_id),
            Self::Bam(bam) => bam.channel_tre_max(channel_id),
        }
    }

    fn channel_trans_tre_max(&self, channel_id: ChannelId) -> u32 {
        match self {
            Self::Gsi(gsi) => gsi.channel_trans_tre_max(channel_id),
            Self::Bam(bam) => bam.channel_trans_tre_max(channel_id),
        }
    }

    fn channel_start(&self, channel_id: ChannelId) -> Result<()> {
        match self {
            Self::Gsi(gsi) => gsi.channel_start(channel_id),
            Self::Bam(bam) => bam.channel_start(channel_id),
        }
    }

    fn channel_stop(&self, channel_id: ChannelId) -> Result<()> {
        match self {
            Self::Gsi(gsi) => gsi.channel_stop(channel_id),
            Self::Bam(bam) => bam.channel_stop(channel_id),
        }
    }

    fn channel_reset(&self, channel_id: ChannelId, doorbell: bool) {
        match self {
            Self::Gsi(gsi) => gsi.channel_reset(channel_id, doorbell),
            Self::Bam(bam) => bam.channel_reset(channel_id, doorbell),
        }
    }

    fn channel_suspend(&self, channel_id: ChannelId, stop: bool) -> Result<()> {
        match self {
            Self::Gsi(gsi) => gsi.channel_suspend(channel_id, stop),
            Self::Bam(bam) => bam.channel_suspend(channel_id, stop),
        }
    }

    fn channel_resume(&self, channel_id: ChannelId, start: bool) -> Result<()> {
        match self {
            Self::Gsi(gsi) => gsi.channel_resume(channel_id, start),
            Self::Bam(bam) => bam.channel_resume(channel_id, start),
        }
    }

    fn submit(&self, channel: &Channel, id: TransId, descriptors: &[Descriptor], ring_db: bool) {
        match self {
            Self::Gsi(gsi) => gsi.submit(channel, id, descriptors, ring_db),
            Self::Bam(bam) => bam.submit(channel, id, descriptors, ring_db),
        }
    }

    fn channel_update(&self, channel: &Channel) -> Option<TransId> {
        match self {
            Self::Gsi(gsi) => gsi.channel_update(channel),
            Self::Bam(bam) => bam.channel_update(channel),
        }
    }
}

impl<H: GsiHardware + fmt::Debug, E: DmaEngine + fmt::Debug> fmt::Debug for Backend<H, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gsi(gsi) => f.debug_tuple("Gsi").field(gsi).finish(),
            Self::Bam(bam) => f.debug_tuple("Bam").field(bam).finish(),
        }
    }
}
