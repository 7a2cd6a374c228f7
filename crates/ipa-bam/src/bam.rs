//! # BAM Transport
//!
//! Channels backed by BAM pipes of an external DMA engine.
//!
//! Every descriptor of a transaction is prepared on its own; only the
//! last requests a completion interrupt and its cookie stands for the
//! whole transaction. Completion is found by asking the engine about
//! pending cookies in submission order.
//!
//! BAM pipes have no start, stop, reset or suspend primitive; those
//! operations succeed without touching hardware.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use ipa_core::{ChannelId, Error, IpaVersion, Result, TransportKind};
use ipa_hal::DmaPlatform;
use ipa_trans::{
    Channel, ChannelConfig, CmdPoolConfig, Descriptor, EndpointData, TransId, Transport,
    TransportBase,
};

use crate::engine::{
    DmaEngine, DmaStatus, PrepFlags, SlaveConfig, TransferDirection, BAM_MAX_BURST_SIZE,
};

/// Most channels the driver supports
pub const BAM_CHANNEL_COUNT_MAX: usize = 20;

/// Command payload slots on the command channel
const CMD_POOL_COUNT: u32 = 256;

/// Most commands one transaction may carry
const CMD_POOL_MAX_ALLOC: u32 = 20;

/// Cookie of a transaction not yet handed to the engine
const COOKIE_NONE: u32 = 0;

/// Transport over BAM DMA engine pipes
pub struct BamTransport<E: DmaEngine> {
    base: TransportBase,
    engine: E,
    chans: Vec<Option<E::Chan>>,
}

impl<E: DmaEngine> BamTransport<E> {
    /// Request and configure a pipe for every AP-owned endpoint in `data`
    pub fn new(
        version: IpaVersion,
        platform: Arc<dyn DmaPlatform>,
        engine: E,
        data: &[EndpointData],
    ) -> Result<Self> {
        if version.transport_kind() != TransportKind::Bam {
            log::error!("bam: {} has no BAM", version);
            return Err(Error::InvalidParameter);
        }

        let mut transport = Self {
            base: TransportBase::new(version, platform),
            engine,
            chans: (0..BAM_CHANNEL_COUNT_MAX).map(|_| None).collect(),
        };

        for endpoint in data {
            if endpoint.name.is_empty() || !endpoint.is_ap() {
                continue;
            }
            transport.channel_init_one(endpoint)?;
        }

        log::info!(
            "bam: {} channels for {}",
            transport.base.channels().count(),
            version
        );
        Ok(transport)
    }

    fn channel_init_one(&mut self, data: &EndpointData) -> Result<()> {
        let id = data.channel_id;
        if id.index() >= BAM_CHANNEL_COUNT_MAX {
            log::error!("bam: channel {} not supported by hardware", id);
            return Err(Error::InvalidParameter);
        }

        let chan = self.engine.request_channel(data.name).map_err(|err| {
            log::error!("bam: failed to request channel {}: {}", data.name, err);
            err
        })?;

        let config = SlaveConfig {
            direction: if data.toward_ipa {
                TransferDirection::MemToDev
            } else {
                TransferDirection::DevToMem
            },
            max_burst: BAM_MAX_BURST_SIZE,
        };
        let channel = ChannelConfig {
            id,
            toward_ipa: data.toward_ipa,
            tre_max: BAM_MAX_BURST_SIZE,
            trans_tre_max: BAM_MAX_BURST_SIZE,
            cmd_pool: data.command.then_some(CmdPoolConfig {
                count: CMD_POOL_COUNT,
                max_alloc: CMD_POOL_MAX_ALLOC,
            }),
        };

        let result = self
            .engine
            .slave_config(chan, &config)
            .and_then(|()| self.base.add_channel(channel).map(|_| ()));
        if let Err(err) = result {
            self.engine.release_channel(chan);
            return Err(err);
        }

        self.chans[id.index()] = Some(chan);
        Ok(())
    }

    fn chan(&self, channel_id: ChannelId) -> Option<E::Chan> {
        self.chans.get(channel_id.index()).copied().flatten()
    }

    fn release_chans(&mut self) {
        for entry in self.chans.iter_mut().rev() {
            if let Some(chan) = entry.take() {
                self.engine.terminate_sync(chan);
                self.engine.release_channel(chan);
            }
        }
    }

    /// DMA engine
    #[inline]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Completion callback of a pipe; schedules its poller
    pub fn irq(&self, channel_id: ChannelId) -> bool {
        match self.base.channel(channel_id) {
            Ok(channel) => channel.notify(),
            Err(_) => {
                log::warn!("bam: callback on unknown channel {}", channel_id);
                false
            }
        }
    }

    fn unsupported(&self, channel_id: ChannelId, what: &str) -> Result<()> {
        self.base.channel(channel_id)?;
        log::debug!("bam: channel {} has no {}", channel_id, what);
        Ok(())
    }
}

impl<E: DmaEngine> Transport for BamTransport<E> {
    fn base(&self) -> &TransportBase {
        &self.base
    }

    fn setup(&self) -> Result<()> {
        let _guard = self.base.lock();

        let mut count = 0;
        for channel in self.base.channels() {
            channel.poll_handle().enable();
            // Collect anything that finished before setup
            channel.notify();
            count += 1;
        }
        log::info!("bam: {} channels set up", count);
        Ok(())
    }

    fn teardown(&self) {
        let _guard = self.base.lock();
        for channel in self.base.channels() {
            channel.poll_handle().disable();
        }
        log::info!("bam: torn down");
    }

    fn exit(&mut self) {
        self.base.clear();
        self.release_chans();
    }

    fn channel_start(&self, channel_id: ChannelId) -> Result<()> {
        self.unsupported(channel_id, "start")
    }

    fn channel_stop(&self, channel_id: ChannelId) -> Result<()> {
        self.unsupported(channel_id, "stop")
    }

    fn channel_reset(&self, channel_id: ChannelId, _doorbell: bool) {
        log::debug!("bam: channel {} has no reset", channel_id);
    }

    fn channel_suspend(&self, channel_id: ChannelId, _stop: bool) -> Result<()> {
        self.unsupported(channel_id, "suspend")
    }

    fn channel_resume(&self, channel_id: ChannelId, _start: bool) -> Result<()> {
        self.unsupported(channel_id, "resume")
    }

    fn submit(&self, channel: &Channel, id: TransId, descriptors: &[Descriptor], _ring_db: bool) {
        let channel_id = channel.id();
        let Some(chan) = self.chan(channel_id) else {
            log::error!("bam: submit on channel {} without a pipe", channel_id);
            return;
        };
        let direction = if channel.toward_ipa() {
            TransferDirection::MemToDev
        } else {
            TransferDirection::DevToMem
        };

        for desc in descriptors {
            let mut flags = PrepFlags::empty();
            let mut len = desc.len;
            if desc.is_command() {
                len = u32::from(desc.opcode.raw());
                flags |= PrepFlags::IMM_CMD;
            }
            if desc.last {
                flags |= PrepFlags::INTERRUPT;
            }

            match self
                .engine
                .prep_slave_single(chan, desc.addr, len, direction, flags)
            {
                Ok(cookie) if desc.last => channel.set_trans_cookie(id, cookie),
                Ok(_) => {}
                Err(err) => {
                    log::error!(
                        "bam: channel {} failed to prepare {:?}: {}",
                        channel_id,
                        id,
                        err
                    );
                    channel.set_trans_cancelled(id);
                    channel.notify();
                    break;
                }
            }
        }

        if channel.toward_ipa() {
            channel.tx_queued();
        }
        self.engine.issue_pending(chan);
    }

    fn channel_update(&self, channel: &Channel) -> Option<TransId> {
        let chan = self.chan(channel.id())?;

        // Assumes the engine finishes a pipe's descriptors in order
        let mut newest = None;
        for id in channel.pending_ids() {
            if channel.trans_cancelled(id) {
                newest = Some(id);
                continue;
            }
            let cookie = channel.trans_cookie(id);
            if cookie == COOKIE_NONE {
                break;
            }

            let state = self.engine.tx_status(chan, cookie);
            match state.status {
                DmaStatus::InProgress => break,
                DmaStatus::Error => {
                    log::error!(
                        "bam: channel {} transfer {:?} failed",
                        channel.id(),
                        id
                    );
                    channel.set_trans_cancelled(id);
                }
                DmaStatus::Complete => {
                    if !channel.toward_ipa() {
                        let requested = channel.trans_fragment_bytes(id);
                        channel.set_trans_len(id, requested.saturating_sub(state.residue));
                    }
                }
            }
            newest = Some(id);
        }
        newest
    }
}

impl<E: DmaEngine> Drop for BamTransport<E> {
    fn drop(&mut self) {
        self.base.clear();
        self.release_chans();
    }
}

impl<E: DmaEngine + fmt::Debug> fmt::Debug for BamTransport<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BamTransport")
            .field("base", &self.base)
            .field("engine", &self.engine)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use alloc::collections::BTreeMap;

    use spin::Mutex;

    use ipa_core::{DmaAddr, DmaDirection, EndpointId, Opcode};
    use ipa_hal::host::HostPlatform;
    use ipa_trans::{ChannelData, ExecEnv, TransClient, TransList, TransReport, TransportExt};

    use super::*;
    use crate::engine::TxState;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Prep {
        chan: u32,
        addr: DmaAddr,
        len: u32,
        direction: TransferDirection,
        flags: PrepFlags,
    }

    #[derive(Debug, Default)]
    struct State {
        requested: u32,
        configs: Vec<(u32, SlaveConfig)>,
        preps: Vec<Prep>,
        status: BTreeMap<u32, TxState>,
        issued: u32,
        released: Vec<u32>,
        fail_prep: bool,
    }

    #[derive(Debug, Default)]
    struct FakeEngine {
        state: Mutex<State>,
    }

    impl FakeEngine {
        fn finish(&self, cookie: u32, status: DmaStatus, residue: u32) {
            self.state
                .lock()
                .status
                .insert(cookie, TxState { status, residue });
        }
    }

    impl DmaEngine for FakeEngine {
        type Chan = u32;

        fn request_channel(&self, name: &str) -> Result<u32> {
            let mut state = self.state.lock();
            if name == "missing" {
                return Err(Error::HardwareFault);
            }
            state.requested += 1;
            Ok(state.requested - 1)
        }

        fn release_channel(&self, chan: u32) {
            self.state.lock().released.push(chan);
        }

        fn slave_config(&self, chan: u32, config: &SlaveConfig) -> Result<()> {
            self.state.lock().configs.push((chan, *config));
            Ok(())
        }

        fn prep_slave_single(
            &self,
            chan: u32,
            addr: DmaAddr,
            len: u32,
            direction: TransferDirection,
            flags: PrepFlags,
        ) -> Result<u32> {
            let mut state = self.state.lock();
            if state.fail_prep {
                return Err(Error::OutOfMemory);
            }
            state.preps.push(Prep {
                chan,
                addr,
                len,
                direction,
                flags,
            });
            Ok(state.preps.len() as u32)
        }

        fn issue_pending(&self, _chan: u32) {
            self.state.lock().issued += 1;
        }

        fn tx_status(&self, _chan: u32, cookie: u32) -> TxState {
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

        fn terminate_sync(&self, _chan: u32) {}
    }

    #[derive(Debug, Default)]
    struct Reports {
        completed: Mutex<Vec<TransReport>>,
    }

    impl TransClient for Reports {
        fn trans_complete(&self, report: &TransReport) {
            self.completed.lock().push(*report);
        }
    }

    const CMD: ChannelId = ChannelId::new(3);
    const RX: ChannelId = ChannelId::new(2);
    const TX: ChannelId = ChannelId::new(4);

    fn endpoint(name: &'static str, id: u8, toward_ipa: bool, command: bool) -> EndpointData {
        EndpointData {
            name,
            ee: ExecEnv::Ap,
            channel_id: ChannelId::new(id),
            endpoint_id: EndpointId::new(id),
            toward_ipa,
            command,
            channel: ChannelData::default(),
        }
    }

    fn transport() -> BamTransport<FakeEngine> {
        let data = [
            endpoint("cmd", 3, true, true),
            endpoint("lan_rx", 2, false, false),
            endpoint("tx", 4, true, false),
            EndpointData {
                ee: ExecEnv::Modem,
                ..endpoint("modem_tx", 6, true, false)
            },
            endpoint("", 7, true, false),
        ];
        BamTransport::new(
            IpaVersion::V2_6L,
            Arc::new(HostPlatform::new()),
            FakeEngine::default(),
            &data,
        )
        .unwrap()
    }

    fn commit(transport: &BamTransport<FakeEngine>, channel_id: ChannelId, len: u32) -> TransId {
        let direction = if channel_id == RX {
            DmaDirection::FromDevice
        } else {
            DmaDirection::ToDevice
        };
        let mut trans = transport
            .channel_trans_alloc(channel_id, 1, direction)
            .unwrap();
        trans.add_mapped(DmaAddr::new(0x4000_0000), len).unwrap();
        let id = trans.id();
        trans.commit();
        id
    }

    #[test]
    fn test_channel_init() {
        let transport = transport();
        assert_eq!(transport.base().channels().count(), 3);
        assert_eq!(transport.channel_tre_max(TX), 16);
        assert_eq!(transport.channel_trans_tre_max(CMD), 16);
        assert!(transport.base().channel(CMD).unwrap().has_cmd_pool());
        assert!(!transport.base().channel(TX).unwrap().has_cmd_pool());
        assert!(transport.base().channel(ChannelId::new(6)).is_err());

        let state = transport.engine().state.lock();
        assert_eq!(
            state.configs[0].1,
            SlaveConfig {
                direction: TransferDirection::MemToDev,
                max_burst: 16
            }
        );
        assert_eq!(state.configs[1].1.direction, TransferDirection::DevToMem);
    }

    #[test]
    fn test_init_rejects() {
        let platform: Arc<dyn DmaPlatform> = Arc::new(HostPlatform::new());
        assert!(matches!(
            BamTransport::new(IpaVersion::V4_2, platform.clone(), FakeEngine::default(), &[]),
            Err(Error::InvalidParameter)
        ));
        assert!(matches!(
            BamTransport::new(
                IpaVersion::V2_6L,
                platform.clone(),
                FakeEngine::default(),
                &[endpoint("tx", BAM_CHANNEL_COUNT_MAX as u8, true, false)]
            ),
            Err(Error::InvalidParameter)
        ));
        assert!(matches!(
            BamTransport::new(
                IpaVersion::V2_6L,
                platform,
                FakeEngine::default(),
                &[endpoint("missing", 1, true, false)]
            ),
            Err(Error::HardwareFault)
        ));
    }

    #[test]
    fn test_command_descriptors() {
        let transport = transport();
        let mut trans = transport.cmd_trans_alloc(CMD, 2).unwrap();
        let payload = trans.payload_alloc(&[1, 2, 3, 4]).unwrap();
        trans
            .add_command(payload, 16, DmaDirection::None, Opcode::new(12))
            .unwrap();
        trans
            .add_command(payload, 8, DmaDirection::ToDevice, Opcode::new(20))
            .unwrap();
        let id = trans.id();
        trans.commit();

        let state = transport.engine().state.lock();
        assert_eq!(state.preps.len(), 2);
        assert_eq!(state.preps[0].chan, 0);
        assert_eq!(state.preps[0].addr, payload);
        assert_eq!(state.preps[0].direction, TransferDirection::MemToDev);
        assert_eq!(state.preps[0].len, 12);
        assert_eq!(state.preps[0].flags, PrepFlags::IMM_CMD);
        assert_eq!(state.preps[1].len, 20);
        assert_eq!(
            state.preps[1].flags,
            PrepFlags::IMM_CMD | PrepFlags::INTERRUPT
        );
        assert_eq!(state.issued, 1);
        let channel = transport.base().channel(CMD).unwrap();
        assert_eq!(channel.trans_cookie(id), 2);
    }

    #[test]
    fn test_in_order_completion() {
        let transport = transport();
        let channel = transport.base().channel(TX).unwrap();

        let ids: Vec<TransId> = (0..3).map(|_| commit(&transport, TX, 100)).collect();
        assert_eq!(transport.engine().state.lock().preps[0].flags, PrepFlags::INTERRUPT);

        // Third finished first; only the head is collected
        transport.engine().finish(1, DmaStatus::Complete, 0);
        transport.engine().finish(3, DmaStatus::Complete, 0);
        assert_eq!(transport.channel_poll(TX, 8).unwrap(), 1);
        assert_eq!(channel.trans_list(ids[1]), Some(TransList::Pending));

        transport.engine().finish(2, DmaStatus::Complete, 0);
        assert_eq!(transport.channel_poll(TX, 8).unwrap(), 2);
        assert_eq!(channel.counters().compl_byte_count, 300);
        assert_eq!(channel.tre_avail(), 16);
    }

    #[test]
    fn test_rx_length_from_residue() {
        let transport = transport();
        let channel = transport.base().channel(RX).unwrap();

        commit(&transport, RX, 2048);
        transport.engine().finish(1, DmaStatus::Complete, 1948);
        assert_eq!(transport.channel_poll(RX, 8).unwrap(), 1);
        assert_eq!(channel.counters().byte_count, 100);
    }

    #[test]
    fn test_error_cancels() {
        let transport = transport();
        let channel = transport.base().channel(TX).unwrap();
        let reports = Arc::new(Reports::default());
        channel.set_client(reports.clone()).unwrap();

        commit(&transport, TX, 100);
        transport.engine().finish(1, DmaStatus::Error, 100);
        assert_eq!(transport.channel_poll(TX, 8).unwrap(), 1);

        let completed = reports.completed.lock();
        assert_eq!(completed.len(), 1);
        assert!(completed[0].cancelled);
        assert_eq!(channel.outstanding(), 0);
    }

    #[test]
    fn test_prep_failure_cancels() {
        let transport = transport();
        let channel = transport.base().channel(TX).unwrap();

        transport.engine().state.lock().fail_prep = true;
        let id = commit(&transport, TX, 100);
        assert!(channel.trans_cancelled(id));
        assert!(channel.poll_handle().is_scheduled());

        assert_eq!(transport.channel_poll(TX, 8).unwrap(), 1);
        assert_eq!(channel.tre_avail(), 16);
    }

    #[test]
    fn test_control_is_noop() {
        let transport = transport();
        transport.channel_start(TX).unwrap();
        transport.channel_stop(TX).unwrap();
        transport.channel_suspend(TX, true).unwrap();
        transport.channel_resume(TX, true).unwrap();
        transport.channel_reset(TX, true);
        assert_eq!(
            transport.channel_start(ChannelId::new(9)),
            Err(Error::ChannelNotFound(9))
        );
    }

    #[test]
    fn test_setup_schedules_polling() {
        let transport = transport();
        transport.setup().unwrap();
        assert!(transport.base().channels().all(|c| c.poll_handle().is_scheduled()));
        assert!(!transport.irq(TX));

        transport.teardown();
        assert!(transport.base().channels().all(|c| !c.poll_handle().is_enabled()));
    }

    #[test]
    fn test_exit_releases_pipes() {
        let mut transport = transport();
        transport.exit();
        assert_eq!(transport.base().channels().count(), 0);

        let mut released = transport.engine().state.lock().released.clone();
        released.sort_unstable();
        assert_eq!(released, [0, 1, 2]);
    }
}
