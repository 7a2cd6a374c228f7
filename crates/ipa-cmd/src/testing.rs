//! Command channel transport for encoder tests

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use spin::Mutex;

use ipa_core::{ChannelId, DmaDirection, IpaVersion, Result};
use ipa_hal::host::HostPlatform;
use ipa_trans::{
    Channel, ChannelConfig, CmdPoolConfig, Descriptor, TransId, Transport, TransportBase,
};

pub(crate) const CMD: ChannelId = ChannelId::new(3);

/// Transport whose hardware finishes everything it is given at once
#[derive(Debug)]
pub(crate) struct CmdTransport {
    base: TransportBase,
    platform: Arc<HostPlatform>,
    submitted: Mutex<Vec<Descriptor>>,
}

impl CmdTransport {
    pub(crate) fn new(version: IpaVersion) -> Self {
        let platform = Arc::new(HostPlatform::new());
        let mut base = TransportBase::new(version, platform.clone());
        base.add_channel(ChannelConfig {
            id: CMD,
            toward_ipa: true,
            tre_max: 16,
            trans_tre_max: 8,
            cmd_pool: Some(CmdPoolConfig {
                count: 16,
                max_alloc: 8,
            }),
        })
        .unwrap();

        Self {
            base,
            platform,
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn channel(&self) -> &Channel {
        self.base.channel(CMD).unwrap()
    }

    pub(crate) fn descriptors(&self) -> Vec<Descriptor> {
        self.submitted.lock().clone()
    }

    pub(crate) fn directions(&self) -> Vec<DmaDirection> {
        self.submitted.lock().iter().map(|desc| desc.direction).collect()
    }

    /// Payload bytes a command descriptor points at
    pub(crate) fn payload(&self, desc: &Descriptor) -> Vec<u8> {
        let mut out = vec![0u8; desc.len as usize];
        assert!(self.platform.read_coherent(desc.addr, &mut out));
        out
    }
}

impl Transport for CmdTransport {
    fn base(&self) -> &TransportBase {
        &self.base
    }

    fn setup(&self) -> Result<()> {
        Ok(())
    }

    fn teardown(&self) {}

    fn exit(&mut self) {
        self.base.clear();
    }

    fn channel_start(&self, _channel_id: ChannelId) -> Result<()> {
        Ok(())
    }

    fn channel_stop(&self, _channel_id: ChannelId) -> Result<()> {
        Ok(())
    }

    fn channel_reset(&self, _channel_id: ChannelId, _doorbell: bool) {}

    fn channel_suspend(&self, _channel_id: ChannelId, _stop: bool) -> Result<()> {
        Ok(())
    }

    fn channel_resume(&self, _channel_id: ChannelId, _start: bool) -> Result<()> {
        Ok(())
    }

    fn submit(&self, channel: &Channel, _id: TransId, descriptors: &[Descriptor], _ring_db: bool) {
        self.submitted.lock().extend_from_slice(descriptors);
        channel.tx_queued();
    }

    fn channel_update(&self, channel: &Channel) -> Option<TransId> {
        channel.pending_ids().last().copied()
    }
}
