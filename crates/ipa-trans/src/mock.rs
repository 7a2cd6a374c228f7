//! Scripted transport and recording client for engine tests

use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::Mutex;

use ipa_core::{ChannelId, IpaVersion, Result};
use ipa_hal::host::HostPlatform;

use crate::channel::{Channel, ChannelConfig, CmdPoolConfig};
use crate::client::{TransClient, TransReport};
use crate::trans::TransId;
use crate::transport::{Descriptor, Transport, TransportBase};

pub(crate) fn data_channel(
    id: u8,
    toward_ipa: bool,
    tre_max: u32,
    trans_tre_max: u32,
) -> ChannelConfig {
    ChannelConfig {
        id: ChannelId::new(id),
        toward_ipa,
        tre_max,
        trans_tre_max,
        cmd_pool: None,
    }
}

pub(crate) fn cmd_channel(id: u8, tre_max: u32, trans_tre_max: u32) -> ChannelConfig {
    ChannelConfig {
        cmd_pool: Some(CmdPoolConfig {
            count: tre_max,
            max_alloc: trans_tre_max,
        }),
        ..data_channel(id, true, tre_max, trans_tre_max)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Submission {
    pub(crate) channel_id: ChannelId,
    pub(crate) id: TransId,
    pub(crate) descriptors: Vec<Descriptor>,
    pub(crate) ring_db: bool,
}

/// Transport whose hardware finishes transactions only when told to
#[derive(Debug)]
pub(crate) struct MockTransport {
    base: TransportBase,
    pub(crate) platform: Arc<HostPlatform>,
    submissions: Mutex<Vec<Submission>>,
    finished: Mutex<Vec<(ChannelId, TransId, u32)>>,
}

impl MockTransport {
    pub(crate) fn new(configs: &[ChannelConfig]) -> Self {
        let platform = Arc::new(HostPlatform::new());
        let mut base = TransportBase::new(IpaVersion::V4_2, platform.clone());
        for config in configs {
            base.add_channel(*config).unwrap();
        }
        Self {
            base,
            platform,
            submissions: Mutex::new(Vec::new()),
            finished: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn channel(&self, id: ChannelId) -> &Channel {
        self.base.channel(id).unwrap()
    }

    pub(crate) fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().clone()
    }

    /// Hardware finished `id`, moving `len` bytes
    pub(crate) fn finish(&self, channel_id: ChannelId, id: TransId, len: u32) {
        self.finished.lock().push((channel_id, id, len));
    }
}

impl Transport for MockTransport {
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

    fn channel_reset(&self, channel_id: ChannelId, _doorbell: bool) {
        if let Ok(channel) = self.base.channel(channel_id) {
            channel.cancel_pending();
        }
    }

    fn channel_suspend(&self, _channel_id: ChannelId, _stop: bool) -> Result<()> {
        Ok(())
    }

    fn channel_resume(&self, _channel_id: ChannelId, _start: bool) -> Result<()> {
        Ok(())
    }

    fn submit(&self, channel: &Channel, id: TransId, descriptors: &[Descriptor], ring_db: bool) {
        self.submissions.lock().push(Submission {
            channel_id: channel.id(),
            id,
            descriptors: descriptors.to_vec(),
            ring_db,
        });
        if ring_db && channel.toward_ipa() {
            channel.tx_queued();
        }
    }

    fn channel_update(&self, channel: &Channel) -> Option<TransId> {
        let mut finished = self.finished.lock();
        let mut consumed = Vec::new();

        for id in channel.pending_ids() {
            let Some(&(_, _, len)) = finished
                .iter()
                .find(|(c, t, _)| *c == channel.id() && *t == id)
            else {
                break;
            };
            if !channel.toward_ipa() {
                channel.set_trans_len(id, len);
            }
            consumed.push(id);
        }

        finished.retain(|(c, t, _)| !(*c == channel.id() && consumed.contains(t)));
        consumed.last().copied()
    }
}

#[derive(Debug, Default)]
pub(crate) struct RecordingClient {
    pub(crate) completed: Mutex<Vec<TransReport>>,
    pub(crate) released: Mutex<Vec<TransReport>>,
    pub(crate) queued: Mutex<Vec<(u32, u32)>>,
    pub(crate) tx_completed: Mutex<Vec<(u32, u32)>>,
}

impl TransClient for RecordingClient {
    fn trans_complete(&self, report: &TransReport) {
        self.completed.lock().push(*report);
    }

    fn trans_release(&self, report: &TransReport) {
        self.released.lock().push(*report);
    }

    fn tx_queued(&self, _channel_id: ChannelId, count: u32, bytes: u32) {
        self.queued.lock().push((count, bytes));
    }

    fn tx_completed(&self, _channel_id: ChannelId, count: u32, bytes: u32) {
        self.tx_completed.lock().push((count, bytes));
    }
}
