//! # GSI Transport
//!
//! Channels backed by transfer rings in coherent memory.
//!
//! ```text
//!            ring (tre_count elements, wraps)
//!   ┌─────┬─────┬─────┬─────┬─────┬─────┬─────┬─────┐
//!   │ T0  │ T0  │ T0* │ T1* │ T2  │ T2* │     │     │
//!   └─────┴─────┴─────┴─────┴─────┴─────┴─────┴─────┘
//!                  │     │           │     ▲
//!   map[index] ────┴─────┴───────────┘   index (next free)
//!
//!   * last element of a transaction, mapped back to its TransId
//! ```
//!
//! Submission writes one element per descriptor starting at the ring
//! index and records which transaction owns the final element. Hardware
//! reports completions as events naming that final element.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

use spin::Mutex;

use ipa_core::{ChannelId, DmaAddr, Error, IpaVersion, Opcode, Result, TransportKind};
use ipa_hal::{arch, CoherentMemory, DmaPlatform};
use ipa_trans::{
    Channel, ChannelConfig, CmdPoolConfig, Descriptor, EndpointData, TransId, TransList,
    Transport, TransportBase,
};

use crate::hw::{ChannelCommand, GsiHardware, GSI_CHANNEL_COUNT_MAX, GSI_TLV_MAX};
use crate::tre::{Tre, TRE_SIZE};

/// Attempts at stopping a channel that reports busy
const STOP_RETRIES: u32 = 10;

/// Delay between stop attempts
const STOP_RETRY_DELAY_US: u64 = 3000;

/// Map entry of an element no transaction ends on
const TRANS_NONE: u32 = u32::MAX;

// =============================================================================
// RING
// =============================================================================

struct GsiRing {
    mem: CoherentMemory,
    count: u32,
    /// Next element to fill; free-running, reduced modulo `count`
    index: Mutex<u32>,
    map: Box<[AtomicU32]>,
}

impl GsiRing {
    fn new(platform: &Arc<dyn DmaPlatform>, count: u32) -> Result<Self> {
        let mem = platform.alloc_coherent(count as usize * TRE_SIZE)?;
        Ok(Self {
            mem,
            count,
            index: Mutex::new(0),
            map: (0..count).map(|_| AtomicU32::new(TRANS_NONE)).collect(),
        })
    }

    #[inline]
    fn slot(&self, index: u32) -> usize {
        (index % self.count) as usize
    }

    fn write(&self, index: u32, tre: &Tre) {
        self.mem.write(self.slot(index) * TRE_SIZE, &tre.encode());
    }

    fn read(&self, index: u32) -> Option<Tre> {
        let mut bytes = [0u8; TRE_SIZE];
        self.mem.read(self.slot(index) * TRE_SIZE, &mut bytes);
        Tre::decode(&bytes)
    }

    fn map(&self, index: u32, id: u32) {
        self.map[self.slot(index)].store(id, Ordering::Release);
    }

    fn lookup(&self, index: u32) -> Option<TransId> {
        match self.map[self.slot(index)].load(Ordering::Acquire) {
            TRANS_NONE => None,
            raw => Some(TransId::new(raw)),
        }
    }

    fn rewind(&self) {
        *self.index.lock() = 0;
        for entry in self.map.iter() {
            entry.store(TRANS_NONE, Ordering::Release);
        }
    }

    fn release(self, platform: &Arc<dyn DmaPlatform>) {
        platform.free_coherent(self.mem);
    }
}

struct GsiChannel {
    ring: GsiRing,
    event_count: u32,
}

// =============================================================================
// TRANSPORT
// =============================================================================

/// Transport over GSI transfer rings
pub struct GsiTransport<H: GsiHardware> {
    base: TransportBase,
    hw: H,
    channels: Vec<Option<GsiChannel>>,
}

impl<H: GsiHardware> GsiTransport<H> {
    /// Build every AP-owned channel described by `data`.
    ///
    /// Channels owned by the modem are left to modem firmware.
    pub fn new(
        version: IpaVersion,
        platform: Arc<dyn DmaPlatform>,
        hw: H,
        data: &[EndpointData],
    ) -> Result<Self> {
        if version.transport_kind() != TransportKind::Gsi {
            log::error!("gsi: {} has no GSI", version);
            return Err(Error::InvalidParameter);
        }

        let mut transport = Self {
            base: TransportBase::new(version, platform),
            hw,
            channels: (0..GSI_CHANNEL_COUNT_MAX).map(|_| None).collect(),
        };

        for endpoint in data {
            if endpoint.is_empty() {
                continue;
            }
            if !endpoint.is_ap() {
                log::debug!("gsi: channel {} belongs to the modem", endpoint.channel_id);
                continue;
            }
            transport.channel_init_one(endpoint)?;
        }

        log::info!(
            "gsi: {} channels for {}",
            transport.base.channels().count(),
            version
        );
        Ok(transport)
    }

    fn channel_data_valid(data: &EndpointData) -> bool {
        let id = data.channel_id;
        let channel = &data.channel;

        if id.index() >= GSI_CHANNEL_COUNT_MAX {
            log::error!("gsi: channel {} beyond the hardware maximum", id);
            return false;
        }
        if channel.tlv_count == 0 || channel.tlv_count > GSI_TLV_MAX {
            log::error!("gsi: channel {} bad TLV count {}", id, channel.tlv_count);
            return false;
        }
        if !channel.tre_count.is_power_of_two() {
            log::error!(
                "gsi: channel {} TRE count {} not a power of two",
                id,
                channel.tre_count
            );
            return false;
        }
        if channel.tre_count < 2 * channel.tlv_count {
            log::error!(
                "gsi: channel {} TRE count {} too small for TLV count {}",
                id,
                channel.tre_count,
                channel.tlv_count
            );
            return false;
        }
        true
    }

    fn channel_init_one(&mut self, data: &EndpointData) -> Result<()> {
        if !Self::channel_data_valid(data) {
            return Err(Error::InvalidParameter);
        }

        let tlv_count = data.channel.tlv_count;
        let tre_max = data.channel.tre_count - (tlv_count - 1);
        let config = ChannelConfig {
            id: data.channel_id,
            toward_ipa: data.toward_ipa,
            tre_max,
            trans_tre_max: tlv_count,
            cmd_pool: data.command.then_some(CmdPoolConfig {
                count: tre_max,
                max_alloc: tlv_count,
            }),
        };

        let ring = GsiRing::new(self.base.platform(), data.channel.tre_count)?;
        if let Err(err) = self.base.add_channel(config) {
            ring.release(self.base.platform());
            return Err(err);
        }

        self.channels[data.channel_id.index()] = Some(GsiChannel {
            ring,
            event_count: data.channel.event_count,
        });
        Ok(())
    }

    fn gsi_channel(&self, channel_id: ChannelId) -> Result<&GsiChannel> {
        self.channels
            .get(channel_id.index())
            .and_then(Option::as_ref)
            .ok_or(Error::ChannelNotFound(channel_id.raw()))
    }

    fn release_rings(&mut self) {
        for entry in &mut self.channels {
            if let Some(channel) = entry.take() {
                channel.ring.release(self.base.platform());
            }
        }
    }

    /// Register interface
    #[inline]
    pub fn hardware(&self) -> &H {
        &self.hw
    }

    /// Read back the ring element at `index`
    pub fn ring_entry(&self, channel_id: ChannelId, index: u32) -> Option<Tre> {
        self.gsi_channel(channel_id).ok()?.ring.read(index)
    }

    /// Free-running fill index of a channel's ring
    pub fn ring_index(&self, channel_id: ChannelId) -> Option<u32> {
        Some(*self.gsi_channel(channel_id).ok()?.ring.index.lock())
    }

    fn doorbell(&self, channel_id: ChannelId, ring: &GsiRing, index: u32) {
        // Elements must be visible before hardware fetches them
        arch::dma_wmb();
        log::trace!("gsi: channel {} doorbell at {}", channel_id, index);
        self.hw.ring_doorbell(channel_id, ring.slot(index) as u32);
    }

    /// Read one byte at `addr` through a channel, outside any transaction.
    ///
    /// Used to flush a receive channel before reset.
    pub fn read_byte(&self, channel_id: ChannelId, addr: DmaAddr) -> Result<()> {
        let channel = self.base.channel(channel_id)?;
        let gsi = self.gsi_channel(channel_id)?;

        if !channel.tre_reserve(1) {
            return Err(Error::Busy);
        }

        let mut index = gsi.ring.index.lock();
        gsi.ring
            .write(*index, &Tre::fill(addr, 1, Opcode::NONE, true, false));
        gsi.ring.map(*index, TRANS_NONE);
        *index = index.wrapping_add(1);
        self.doorbell(channel_id, &gsi.ring, *index);

        Ok(())
    }

    /// Release the element reserved by [`GsiTransport::read_byte`]
    pub fn read_byte_done(&self, channel_id: ChannelId) -> Result<()> {
        self.base.channel(channel_id)?.tre_release(1);
        Ok(())
    }

    /// Completion interrupt for a channel; schedules its poller
    pub fn irq(&self, channel_id: ChannelId) -> bool {
        match self.base.channel(channel_id) {
            Ok(channel) => channel.notify(),
            Err(_) => {
                log::warn!("gsi: interrupt on unknown channel {}", channel_id);
                false
            }
        }
    }

    fn channel_freeze(&self, channel: &Channel) {
        channel.poll_handle().disable();
        self.hw.irq_enable(channel.id(), false);
    }

    fn channel_thaw(&self, channel: &Channel) {
        self.hw.irq_enable(channel.id(), true);
        channel.poll_handle().enable();
        // Pick up anything that finished while frozen
        channel.notify();
    }

    fn stop_retry(&self, channel_id: ChannelId) -> Result<()> {
        for _ in 0..STOP_RETRIES {
            match self.hw.channel_command(channel_id, ChannelCommand::Stop) {
                Err(Error::Busy) => self.base.platform().sleep_us(STOP_RETRY_DELAY_US),
                other => return other,
            }
        }
        log::error!("gsi: channel {} did not stop", channel_id);
        Err(Error::Busy)
    }
}

impl<H: GsiHardware> Transport for GsiTransport<H> {
    fn base(&self) -> &TransportBase {
        &self.base
    }

    fn setup(&self) -> Result<()> {
        let _guard = self.base.lock();

        let mut done: Vec<ChannelId> = Vec::new();
        for channel in self.base.channels() {
            let id = channel.id();
            let gsi = self.gsi_channel(id)?;

            let result = self
                .hw
                .channel_command(id, ChannelCommand::Allocate)
                .and_then(|()| {
                    self.hw.channel_program(
                        id,
                        gsi.ring.mem.addr(),
                        gsi.ring.count,
                        gsi.event_count,
                        true,
                    )
                });
            if let Err(err) = result {
                log::error!("gsi: channel {} setup failed: {}", id, err);
                for &id in done.iter().rev() {
                    self.hw.irq_enable(id, false);
                    let _ = self.hw.channel_command(id, ChannelCommand::DeAllocate);
                }
                return Err(err);
            }

            self.hw.irq_enable(id, true);
            channel.poll_handle().enable();
            done.push(id);
        }

        log::info!("gsi: {} channels set up", done.len());
        Ok(())
    }

    fn teardown(&self) {
        let _guard = self.base.lock();

        let channels: Vec<&Channel> = self.base.channels().collect();
        for channel in channels.into_iter().rev() {
            self.channel_freeze(channel);
            if let Err(err) = self
                .hw
                .channel_command(channel.id(), ChannelCommand::DeAllocate)
            {
                log::warn!("gsi: channel {} de-allocate failed: {}", channel.id(), err);
            }
        }
        log::info!("gsi: torn down");
    }

    fn exit(&mut self) {
        self.base.clear();
        self.release_rings();
    }

    fn channel_start(&self, channel_id: ChannelId) -> Result<()> {
        let _guard = self.base.lock();
        self.gsi_channel(channel_id)?;
        self.hw.channel_command(channel_id, ChannelCommand::Start)
    }

    fn channel_stop(&self, channel_id: ChannelId) -> Result<()> {
        let _guard = self.base.lock();
        self.gsi_channel(channel_id)?;
        self.stop_retry(channel_id)
    }

    fn channel_reset(&self, channel_id: ChannelId, doorbell: bool) {
        let _guard = self.base.lock();
        let (Ok(channel), Ok(gsi)) = (self.base.channel(channel_id), self.gsi_channel(channel_id))
        else {
            log::warn!("gsi: reset of unknown channel {}", channel_id);
            return;
        };

        if let Err(err) = self.hw.channel_command(channel_id, ChannelCommand::Reset) {
            log::error!("gsi: channel {} reset failed: {}", channel_id, err);
        }
        gsi.ring.rewind();
        if let Err(err) = self.hw.channel_program(
            channel_id,
            gsi.ring.mem.addr(),
            gsi.ring.count,
            gsi.event_count,
            doorbell,
        ) {
            log::error!("gsi: channel {} reprogram failed: {}", channel_id, err);
        }

        channel.cancel_pending();
    }

    fn channel_suspend(&self, channel_id: ChannelId, stop: bool) -> Result<()> {
        let _guard = self.base.lock();
        let channel = self.base.channel(channel_id)?;

        self.channel_freeze(channel);
        if stop {
            if let Err(err) = self.stop_retry(channel_id) {
                self.channel_thaw(channel);
                return Err(err);
            }
        }
        Ok(())
    }

    fn channel_resume(&self, channel_id: ChannelId, start: bool) -> Result<()> {
        let _guard = self.base.lock();
        let channel = self.base.channel(channel_id)?;

        if start {
            self.hw.channel_command(channel_id, ChannelCommand::Start)?;
        }
        self.channel_thaw(channel);
        Ok(())
    }

    fn submit(&self, channel: &Channel, id: TransId, descriptors: &[Descriptor], ring_db: bool) {
        let channel_id = channel.id();
        let Ok(gsi) = self.gsi_channel(channel_id) else {
            log::error!("gsi: submit on channel {} without a ring", channel_id);
            return;
        };
        // Inbound completions interrupt; outbound ones are polled
        let bei = channel.toward_ipa();

        let mut index = gsi.ring.index.lock();
        for desc in descriptors {
            gsi.ring.write(*index, &Tre::from_descriptor(desc, bei));
            *index = index.wrapping_add(1);
        }
        gsi.ring.map(index.wrapping_sub(1), id.raw());

        if ring_db || channel.tre_avail() == 0 {
            if channel.toward_ipa() {
                channel.tx_queued();
            }
            self.doorbell(channel_id, &gsi.ring, *index);
        }
    }

    fn channel_update(&self, channel: &Channel) -> Option<TransId> {
        let channel_id = channel.id();
        let gsi = self.gsi_channel(channel_id).ok()?;

        let mut newest = None;
        while let Some(event) = self.hw.next_event(channel_id) {
            let Some(id) = gsi.ring.lookup(event.tre_index) else {
                log::warn!(
                    "gsi: channel {} event for unmapped element {}",
                    channel_id,
                    event.tre_index
                );
                continue;
            };
            if channel.trans_list(id) != Some(TransList::Pending) {
                continue;
            }
            if !channel.toward_ipa() {
                channel.set_trans_len(id, event.len);
            }
            newest = Some(id);
        }
        newest
    }
}

impl<H: GsiHardware> Drop for GsiTransport<H> {
    fn drop(&mut self) {
        self.base.clear();
        self.release_rings();
    }
}

impl<H: GsiHardware + fmt::Debug> fmt::Debug for GsiTransport<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GsiTransport")
            .field("base", &self.base)
            .field("hw", &self.hw)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use ipa_core::{DmaDirection, EndpointId};
    use ipa_hal::host::HostPlatform;
    use ipa_trans::{ChannelData, ExecEnv, TransportExt};

    use super::*;
    use crate::hw::GsiEvent;
    use crate::tre::{TreFlags, TreType};

    #[derive(Debug, Default)]
    struct Regs {
        commands: Vec<(ChannelId, ChannelCommand)>,
        programmed: Vec<(ChannelId, u32, bool)>,
        doorbells: Vec<(ChannelId, u32)>,
        events: Vec<(ChannelId, GsiEvent)>,
        irq: Vec<(ChannelId, bool)>,
        stop_busy: u32,
    }

    #[derive(Debug, Default)]
    struct FakeGsi {
        regs: Mutex<Regs>,
    }

    impl FakeGsi {
        fn event(&self, channel_id: ChannelId, tre_index: u32, len: u32) {
            self.regs
                .lock()
                .events
                .push((channel_id, GsiEvent { tre_index, len }));
        }
    }

    impl GsiHardware for FakeGsi {
        fn channel_program(
            &self,
            channel_id: ChannelId,
            _ring: DmaAddr,
            tre_count: u32,
            _event_count: u32,
            doorbell: bool,
        ) -> Result<()> {
            self.regs
                .lock()
                .programmed
                .push((channel_id, tre_count, doorbell));
            Ok(())
        }

        fn channel_command(&self, channel_id: ChannelId, command: ChannelCommand) -> Result<()> {
            let mut regs = self.regs.lock();
            regs.commands.push((channel_id, command));
            if command == ChannelCommand::Stop && regs.stop_busy > 0 {
                regs.stop_busy -= 1;
                return Err(Error::Busy);
            }
            Ok(())
        }

        fn ring_doorbell(&self, channel_id: ChannelId, index: u32) {
            self.regs.lock().doorbells.push((channel_id, index));
        }

        fn next_event(&self, channel_id: ChannelId) -> Option<GsiEvent> {
            let mut regs = self.regs.lock();
            let pos = regs.events.iter().position(|(c, _)| *c == channel_id)?;
            Some(regs.events.remove(pos).1)
        }

        fn irq_enable(&self, channel_id: ChannelId, enable: bool) {
            self.regs.lock().irq.push((channel_id, enable));
        }
    }

    const CMD: ChannelId = ChannelId::new(0);
    const TX: ChannelId = ChannelId::new(1);
    const RX: ChannelId = ChannelId::new(2);

    fn endpoint(
        id: u8,
        toward_ipa: bool,
        command: bool,
        tre_count: u32,
        tlv_count: u32,
    ) -> EndpointData {
        EndpointData {
            name: "",
            ee: ExecEnv::Ap,
            channel_id: ChannelId::new(id),
            endpoint_id: EndpointId::new(id),
            toward_ipa,
            command,
            channel: ChannelData {
                tre_count,
                event_count: tre_count,
                tlv_count,
            },
        }
    }

    fn transport() -> GsiTransport<FakeGsi> {
        let data = [
            endpoint(0, true, true, 64, 20),
            endpoint(1, true, false, 8, 4),
            endpoint(2, false, false, 8, 2),
            EndpointData {
                ee: ExecEnv::Modem,
                ..endpoint(5, true, false, 8, 4)
            },
        ];
        let platform = Arc::new(HostPlatform::new());
        GsiTransport::new(IpaVersion::V4_2, platform, FakeGsi::default(), &data).unwrap()
    }

    fn commit(
        transport: &GsiTransport<FakeGsi>,
        channel_id: ChannelId,
        frags: u32,
        ring_db: bool,
    ) -> TransId {
        let direction = if transport.base().channel(channel_id).unwrap().toward_ipa() {
            DmaDirection::ToDevice
        } else {
            DmaDirection::FromDevice
        };
        let mut trans = transport
            .channel_trans_alloc(channel_id, frags, direction)
            .unwrap();
        for i in 0..frags {
            trans
                .add_mapped(DmaAddr::new(0x1000 * u64::from(i + 1)), 100)
                .unwrap();
        }
        let id = trans.id();
        if ring_db {
            trans.commit();
        } else {
            trans.commit_batched();
        }
        id
    }

    #[test]
    fn test_channel_geometry() {
        let transport = transport();
        assert_eq!(transport.channel_tre_max(CMD), 64 - 19);
        assert_eq!(transport.channel_trans_tre_max(CMD), 20);
        assert!(transport.base().channel(CMD).unwrap().has_cmd_pool());
        assert_eq!(transport.channel_tre_max(TX), 5);
        // Modem channel is not ours
        assert_eq!(
            transport.base().channel(ChannelId::new(5)).err(),
            Some(Error::ChannelNotFound(5))
        );
    }

    #[test]
    fn test_bad_channel_data() {
        let platform: Arc<dyn DmaPlatform> = Arc::new(HostPlatform::new());
        for data in [
            endpoint(1, true, false, 12, 4),
            endpoint(1, true, false, 8, 0),
            endpoint(1, true, false, 256, GSI_TLV_MAX + 1),
            endpoint(1, true, false, 8, 5),
            endpoint(GSI_CHANNEL_COUNT_MAX as u8, true, false, 8, 4),
        ] {
            assert!(matches!(
                GsiTransport::new(IpaVersion::V4_2, platform.clone(), FakeGsi::default(), &[data]),
                Err(Error::InvalidParameter)
            ));
        }

        assert!(matches!(
            GsiTransport::new(IpaVersion::V2_6L, platform, FakeGsi::default(), &[]),
            Err(Error::InvalidParameter)
        ));
    }

    #[test]
    fn test_setup_programs_rings() {
        let transport = transport();
        transport.setup().unwrap();

        let regs = transport.hardware().regs.lock();
        assert_eq!(
            regs.programmed,
            [(CMD, 64, true), (TX, 8, true), (RX, 8, true)]
        );
        assert!(regs
            .commands
            .iter()
            .all(|(_, command)| *command == ChannelCommand::Allocate));
    }

    #[test]
    fn test_chain_flags_and_map() {
        let transport = transport();
        let id = commit(&transport, TX, 3, true);

        let first = transport.ring_entry(TX, 0).unwrap();
        let last = transport.ring_entry(TX, 2).unwrap();
        assert_eq!(first.flags, TreFlags::CHAIN);
        assert_eq!(transport.ring_entry(TX, 1).unwrap().flags, TreFlags::CHAIN);
        assert_eq!(last.flags, TreFlags::IEOT | TreFlags::BEI);
        assert_eq!(last.tre_type, TreType::Xfer);
        assert_eq!(last.len_opcode, 100);

        let gsi = transport.gsi_channel(TX).unwrap();
        assert_eq!(gsi.ring.lookup(2), Some(id));
        assert_eq!(gsi.ring.lookup(1), None);
        assert_eq!(transport.hardware().regs.lock().doorbells, [(TX, 3)]);
    }

    #[test]
    fn test_ring_wraps() {
        let transport = transport();
        let channel = transport.base().channel(TX).unwrap();

        // Five elements fill the reservation, two per transaction
        let a = commit(&transport, TX, 4, true);
        transport.hardware().event(TX, 3, 0);
        assert_eq!(transport.channel_poll(TX, 8).unwrap(), 1);
        assert_eq!(channel.trans_list(a), None);

        let b = commit(&transport, TX, 4, true);
        assert_eq!(transport.ring_index(TX), Some(8));
        let b_last = transport.ring_entry(TX, 7).unwrap();
        assert_eq!(b_last.flags, TreFlags::IEOT | TreFlags::BEI);

        let c = commit(&transport, TX, 1, true);
        // Wrapped to the start of the ring
        assert_eq!(transport.gsi_channel(TX).unwrap().ring.lookup(8), Some(c));
        assert_eq!(transport.gsi_channel(TX).unwrap().ring.lookup(0), Some(c));

        transport.hardware().event(TX, 8, 0);
        assert_eq!(transport.channel_poll(TX, 8).unwrap(), 2);
        assert_eq!(channel.trans_list(b), None);
        assert_eq!(channel.tre_avail(), 5);
    }

    #[test]
    fn test_doorbell_when_reservation_exhausted() {
        let transport = transport();
        let channel = transport.base().channel(TX).unwrap();

        commit(&transport, TX, 2, false);
        assert!(transport.hardware().regs.lock().doorbells.is_empty());

        commit(&transport, TX, 3, false);
        assert_eq!(channel.tre_avail(), 0);
        assert_eq!(transport.hardware().regs.lock().doorbells, [(TX, 5)]);

        assert!(matches!(
            transport.channel_trans_alloc(TX, 1, DmaDirection::ToDevice),
            Err(Error::Capacity)
        ));
    }

    #[test]
    fn test_rx_event_records_length() {
        let transport = transport();
        let channel = transport.base().channel(RX).unwrap();

        let first = commit(&transport, RX, 1, true);
        let second = commit(&transport, RX, 1, true);
        transport.hardware().event(RX, 0, 60);
        transport.hardware().event(RX, 1, 1400);

        assert_eq!(transport.channel_poll(RX, 8).unwrap(), 2);
        assert_eq!(channel.trans_list(first), None);
        assert_eq!(channel.trans_list(second), None);
        assert_eq!(channel.counters().byte_count, 1460);
        assert_eq!(channel.counters().trans_count, 2);

        let last = transport.ring_entry(RX, 1).unwrap();
        assert_eq!(last.flags, TreFlags::IEOT);
    }

    #[test]
    fn test_command_elements() {
        let transport = transport();
        let mut trans = transport.cmd_trans_alloc(CMD, 2).unwrap();
        let payload = trans.payload_alloc(&[0xaa; 16]).unwrap();
        trans
            .add_command(payload, 16, DmaDirection::None, Opcode::new(12))
            .unwrap();
        trans
            .add_command(payload, 8, DmaDirection::None, Opcode::new(16))
            .unwrap();
        trans.commit();

        let first = transport.ring_entry(CMD, 0).unwrap();
        let second = transport.ring_entry(CMD, 1).unwrap();
        assert_eq!(first.tre_type, TreType::ImmdCmd);
        assert_eq!(first.len_opcode, 12);
        assert_eq!(second.len_opcode, 16);
        assert_eq!(first.addr, payload);
    }

    #[test]
    fn test_stop_retries_busy() {
        let transport = transport();
        transport.hardware().regs.lock().stop_busy = 3;
        transport.channel_stop(TX).unwrap();
        let stops = transport
            .hardware()
            .regs
            .lock()
            .commands
            .iter()
            .filter(|(_, command)| *command == ChannelCommand::Stop)
            .count();
        assert_eq!(stops, 4);

        transport.hardware().regs.lock().stop_busy = STOP_RETRIES;
        assert_eq!(transport.channel_stop(TX), Err(Error::Busy));
    }

    #[test]
    fn test_reset_rewinds_and_cancels() {
        let transport = transport();
        let channel = transport.base().channel(TX).unwrap();

        commit(&transport, TX, 2, true);
        commit(&transport, TX, 1, true);
        transport.channel_reset(TX, false);

        assert_eq!(transport.ring_index(TX), Some(0));
        assert_eq!(channel.list_len(TransList::Completed), 2);
        assert!(channel.poll_handle().is_scheduled());
        assert_eq!(
            transport.hardware().regs.lock().programmed.last(),
            Some(&(TX, 8, false))
        );

        assert_eq!(transport.channel_poll(TX, 8).unwrap(), 2);
        assert_eq!(channel.tre_avail(), 5);
    }

    #[test]
    fn test_suspend_freezes_polling() {
        let transport = transport();
        let channel = transport.base().channel(RX).unwrap();

        transport.channel_suspend(RX, true).unwrap();
        assert!(!channel.poll_handle().is_enabled());
        assert!(!transport.irq(RX));

        transport.channel_resume(RX, true).unwrap();
        assert!(channel.poll_handle().is_enabled());
        assert!(channel.poll_handle().is_scheduled());

        let regs = transport.hardware().regs.lock();
        assert_eq!(
            regs.commands,
            vec![(RX, ChannelCommand::Stop), (RX, ChannelCommand::Start)]
        );
        assert_eq!(regs.irq, vec![(RX, false), (RX, true)]);
    }

    #[test]
    fn test_read_byte() {
        let transport = transport();
        let channel = transport.base().channel(RX).unwrap();

        for _ in 0..channel.tre_max() {
            transport.read_byte(RX, DmaAddr::new(0x9000)).unwrap();
        }
        assert_eq!(transport.read_byte(RX, DmaAddr::new(0x9000)), Err(Error::Busy));

        let tre = transport.ring_entry(RX, 0).unwrap();
        assert_eq!(tre.len_opcode, 1);
        assert_eq!(tre.flags, TreFlags::IEOT);
        assert_eq!(transport.hardware().regs.lock().doorbells.len(), 7);

        transport.read_byte_done(RX).unwrap();
        assert_eq!(channel.tre_avail(), 1);
    }

    #[test]
    fn test_irq_schedules_once() {
        let transport = transport();
        assert!(transport.irq(TX));
        assert!(!transport.irq(TX));
        assert!(!transport.irq(ChannelId::new(9)));
    }
}
