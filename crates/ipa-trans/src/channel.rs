//! # Channels
//!
//! A channel owns the pools its transactions are carved from, the four
//! ordered transaction lists and the cumulative transfer counters.
//!
//! ```text
//!   ┌──────────────────────────── Channel ────────────────────────────┐
//!   │ tre_avail ─ reservation gate for every pool below               │
//!   │                                                                 │
//!   │ trans pool (tre_max, 1)       sg pool (tre_max, trans_tre_max)  │
//!   │ info pool (count, max_alloc)  payload pool (command only)       │
//!   │                                                                 │
//!   │ lists: allocated ─► pending ─► completed ─► polled              │
//!   │ counters: byte/trans, queued_*, compl_*                         │
//!   └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Locking
//!
//! `lists` protects the four lists and the list-ownership records. It is
//! always taken before a transaction's state lock, never after. `submit`
//! serializes hand-off to hardware so pending order matches ring order.
//! Waiters never hold any of these locks while blocking.
//!
//! ## Pool ownership
//!
//! A transaction owns its slot, one fragment run, one command record run
//! and the payload slots recorded there. All of them return to their pools
//! when the last reference drops, before the descriptors are released, so
//! every allocation that passes the reservation finds free entries.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

use arrayvec::ArrayVec;
use spin::{Mutex, Once};
use static_assertions::const_assert;

use ipa_core::{ChannelId, DmaAddr, DmaDirection, Error, Opcode, Result, TRANS_TRE_MAX};
use ipa_hal::DmaPlatform;

use crate::client::{TransClient, TransReport};
use crate::poll::PollHandle;
use crate::pool::{DmaPool, ResourcePool};
use crate::trans::{CmdInfo, Fragment, TransId, TransSlot, TransState};
use crate::transport::{Descriptor, Transport};

/// Size of one command payload slot
pub const CMD_PAYLOAD_SIZE: usize = 32;

// DMA pool elements are 8-byte aligned powers of two
const_assert!(CMD_PAYLOAD_SIZE.is_power_of_two() && CMD_PAYLOAD_SIZE % 8 == 0);

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Command pool geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmdPoolConfig {
    /// Payload slots (and command records)
    pub count: u32,
    /// Most command records one transaction may claim
    pub max_alloc: u32,
}

/// Channel construction parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Hardware channel
    pub id: ChannelId,
    /// Data flows from the host toward the IPA
    pub toward_ipa: bool,
    /// Descriptors available to transactions at once
    pub tre_max: u32,
    /// Most descriptors in one transaction
    pub trans_tre_max: u32,
    /// Command pools, for the command channel only
    pub cmd_pool: Option<CmdPoolConfig>,
}

// =============================================================================
// LISTS & COUNTERS
// =============================================================================

/// Transaction list a transaction belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransList {
    /// Allocated, being filled
    Allocated,
    /// Handed to hardware
    Pending,
    /// Hardware finished, waiting for the poller
    Completed,
    /// Picked up by the poller, being finalized
    Polled,
}

struct TransLists {
    alloc: VecDeque<TransId>,
    pending: VecDeque<TransId>,
    complete: VecDeque<TransId>,
    polled: VecDeque<TransId>,
    owner: Box<[Option<TransList>]>,
}

impl TransLists {
    fn new(count: u32) -> Self {
        Self {
            alloc: VecDeque::new(),
            pending: VecDeque::new(),
            complete: VecDeque::new(),
            polled: VecDeque::new(),
            owner: (0..count).map(|_| None).collect(),
        }
    }

    fn list_mut(&mut self, list: TransList) -> &mut VecDeque<TransId> {
        match list {
            TransList::Allocated => &mut self.alloc,
            TransList::Pending => &mut self.pending,
            TransList::Completed => &mut self.complete,
            TransList::Polled => &mut self.polled,
        }
    }

    fn push(&mut self, id: TransId, list: TransList) {
        self.owner[id.index()] = Some(list);
        self.list_mut(list).push_back(id);
    }

    fn remove(&mut self, id: TransId) -> Option<TransList> {
        let list = self.owner[id.index()].take()?;
        let queue = self.list_mut(list);
        if let Some(pos) = queue.iter().position(|&other| other == id) {
            queue.remove(pos);
        }
        Some(list)
    }

    fn move_tail(&mut self, id: TransId, list: TransList) {
        self.remove(id);
        self.push(id, list);
    }

    fn len(&self, list: TransList) -> usize {
        match list {
            TransList::Allocated => self.alloc.len(),
            TransList::Pending => self.pending.len(),
            TransList::Completed => self.complete.len(),
            TransList::Polled => self.polled.len(),
        }
    }

    fn outstanding(&self) -> usize {
        self.alloc.len() + self.pending.len() + self.complete.len() + self.polled.len()
    }
}

/// Cumulative channel counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChannelCounters {
    /// Bytes committed (transmit) or received
    pub byte_count: u64,
    /// Transactions committed (transmit) or received
    pub trans_count: u64,
    /// Transmit bytes last reported as queued
    pub queued_byte_count: u64,
    /// Transmit transactions last reported as queued
    pub queued_trans_count: u64,
    /// Transmit bytes last reported as completed
    pub compl_byte_count: u64,
    /// Transmit transactions last reported as completed
    pub compl_trans_count: u64,
}

struct CmdPools {
    payload: DmaPool,
    info: ResourcePool<Mutex<CmdInfo>>,
}

// =============================================================================
// CHANNEL
// =============================================================================

/// Transaction channel
pub struct Channel {
    id: ChannelId,
    toward_ipa: bool,
    tre_max: u32,
    trans_tre_max: u32,
    tre_avail: AtomicU32,
    platform: Arc<dyn DmaPlatform>,
    trans_pool: ResourcePool<TransSlot>,
    sg_pool: ResourcePool<Mutex<Fragment>>,
    cmd: Option<CmdPools>,
    lists: Mutex<TransLists>,
    counters: Mutex<ChannelCounters>,
    submit: Mutex<()>,
    pub(crate) poll: PollHandle,
    client: Once<Arc<dyn TransClient>>,
}

impl Channel {
    /// Create a channel and its pools
    pub fn new(platform: Arc<dyn DmaPlatform>, config: ChannelConfig) -> Result<Self> {
        if config.trans_tre_max == 0 || config.trans_tre_max as usize > TRANS_TRE_MAX {
            log::error!(
                "channel {}: unsupported transaction size {}",
                config.id,
                config.trans_tre_max
            );
            return Err(Error::InvalidParameter);
        }

        if let Some(pool) = config.cmd_pool {
            if pool.max_alloc < config.trans_tre_max || pool.count < config.tre_max {
                log::error!(
                    "channel {}: command pool ({}, {}) cannot back {} descriptors",
                    config.id,
                    pool.count,
                    pool.max_alloc,
                    config.tre_max
                );
                return Err(Error::InvalidParameter);
            }
        }

        let trans_pool = ResourcePool::new(config.tre_max, 1, TransSlot::default)?;
        let sg_pool = ResourcePool::new(config.tre_max, config.trans_tre_max, || {
            Mutex::new(Fragment::default())
        })?;
        let cmd = match config.cmd_pool {
            Some(pool) => Some(CmdPools {
                payload: DmaPool::new(
                    platform.clone(),
                    CMD_PAYLOAD_SIZE,
                    pool.count,
                    pool.max_alloc,
                )?,
                info: ResourcePool::new(pool.count, pool.max_alloc, Default::default)?,
            }),
            None => None,
        };

        log::debug!(
            "channel {}: {} descriptors, {} per transaction{}",
            config.id,
            config.tre_max,
            config.trans_tre_max,
            if cmd.is_some() { ", command pools" } else { "" }
        );

        Ok(Self {
            id: config.id,
            toward_ipa: config.toward_ipa,
            tre_max: config.tre_max,
            trans_tre_max: config.trans_tre_max,
            tre_avail: AtomicU32::new(config.tre_max),
            lists: Mutex::new(TransLists::new(trans_pool.count())),
            platform,
            trans_pool,
            sg_pool,
            cmd,
            counters: Mutex::new(ChannelCounters::default()),
            submit: Mutex::new(()),
            poll: PollHandle::new(),
            client: Once::new(),
        })
    }

    /// Hardware channel
    #[inline]
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Data flows from the host toward the IPA
    #[inline]
    pub fn toward_ipa(&self) -> bool {
        self.toward_ipa
    }

    /// Descriptors available to transactions at once
    #[inline]
    pub fn tre_max(&self) -> u32 {
        self.tre_max
    }

    /// Most descriptors in one transaction
    #[inline]
    pub fn trans_tre_max(&self) -> u32 {
        self.trans_tre_max
    }

    /// Descriptors not currently reserved
    #[inline]
    pub fn tre_avail(&self) -> u32 {
        self.tre_avail.load(Ordering::Acquire)
    }

    /// Platform the channel maps and allocates through
    #[inline]
    pub fn platform(&self) -> &Arc<dyn DmaPlatform> {
        &self.platform
    }

    /// Completion polling handle
    #[inline]
    pub fn poll_handle(&self) -> &PollHandle {
        &self.poll
    }

    /// Whether the channel carries immediate commands
    #[inline]
    pub fn has_cmd_pool(&self) -> bool {
        self.cmd.is_some()
    }

    /// Snapshot of the cumulative counters
    pub fn counters(&self) -> ChannelCounters {
        *self.counters.lock()
    }

    /// Number of transactions on `list`
    pub fn list_len(&self, list: TransList) -> usize {
        self.lists.lock().len(list)
    }

    /// List a transaction currently belongs to
    pub fn trans_list(&self, id: TransId) -> Option<TransList> {
        self.lists
            .lock()
            .owner
            .get(id.index())
            .copied()
            .flatten()
    }

    /// Transactions not yet returned to the pool
    pub fn outstanding(&self) -> usize {
        self.lists.lock().outstanding()
    }

    /// Bind the upper-layer client; a channel has at most one
    pub fn set_client(&self, client: Arc<dyn TransClient>) -> Result<()> {
        if self.client.is_completed() {
            log::warn!("channel {}: client already bound", self.id);
            return Err(Error::InvalidState);
        }
        self.client.call_once(|| client);
        Ok(())
    }

    // =========================================================================
    // DESCRIPTOR RESERVATION
    // =========================================================================

    /// Reserve `count` descriptors; `false` if not enough are free
    pub fn tre_reserve(&self, count: u32) -> bool {
        self.tre_avail
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |avail| {
                avail.checked_sub(count)
            })
            .is_ok()
    }

    /// Return `count` reserved descriptors
    pub fn tre_release(&self, count: u32) {
        let old = self.tre_avail.fetch_add(count, Ordering::AcqRel);
        debug_assert!(old + count <= self.tre_max, "descriptor over-release");
    }

    // =========================================================================
    // ALLOCATION & FILLING
    // =========================================================================

    #[inline]
    pub(crate) fn slot(&self, id: TransId) -> &TransSlot {
        self.trans_pool.get(id.raw())
    }

    #[inline]
    pub(crate) fn trans_state(&self, id: TransId) -> TransState {
        *self.slot(id).state.lock()
    }

    pub(crate) fn trans_alloc(
        &self,
        tre_count: u32,
        direction: DmaDirection,
        command: bool,
    ) -> Result<TransId> {
        if tre_count == 0 {
            log::error!("channel {}: empty transaction requested", self.id);
            return Err(Error::InvalidParameter);
        }
        if tre_count > self.trans_tre_max {
            log::error!(
                "channel {}: {} fragments exceed the limit of {}",
                self.id,
                tre_count,
                self.trans_tre_max
            );
            return Err(Error::TooManyFragments);
        }
        if command && self.cmd.is_none() {
            log::error!("channel {}: no command pools", self.id);
            return Err(Error::InvalidState);
        }
        if !self.tre_reserve(tre_count) {
            log::error!(
                "channel {}: no room for {} descriptors ({} free)",
                self.id,
                tre_count,
                self.tre_avail()
            );
            return Err(Error::Capacity);
        }

        let mut lists = self.lists.lock();
        let (id, sg_index, info_index) = match self.runs_alloc(tre_count, command) {
            Ok(runs) => runs,
            Err(err) => {
                drop(lists);
                self.tre_release(tre_count);
                return Err(err);
            }
        };
        debug_assert!(
            lists.owner[id.index()].is_none(),
            "transaction slot reused while live"
        );

        let slot = self.slot(id);
        {
            let mut state = slot.state.lock();
            state.tre_count = tre_count;
            state.direction = direction;
            state.sg_index = sg_index;
            state.info_index = info_index;
        }
        slot.refcount.set(1);
        lists.push(id, TransList::Allocated);

        Ok(id)
    }

    /// Claim a transaction slot and its fragment and command record runs
    fn runs_alloc(&self, tre_count: u32, command: bool) -> Result<(TransId, u32, Option<u32>)> {
        let id = TransId::new(self.trans_pool.alloc(1)?);
        let sg_index = match self.sg_pool.alloc(tre_count) {
            Ok(index) => index,
            Err(err) => {
                self.trans_pool.free(id.raw());
                return Err(err);
            }
        };
        let info_index = match &self.cmd {
            Some(cmd) if command => match cmd.info.alloc(tre_count) {
                Ok(index) => Some(index),
                Err(err) => {
                    self.sg_pool.free(sg_index);
                    self.trans_pool.free(id.raw());
                    return Err(err);
                }
            },
            _ => None,
        };
        Ok((id, sg_index, info_index))
    }

    /// Return everything `runs_alloc` claimed, plus recorded payloads
    fn runs_free(&self, id: TransId, state: &TransState) {
        if let (Some(cmd), Some(first)) = (&self.cmd, state.info_index) {
            for index in 0..state.tre_count {
                if let Some(payload) = cmd.info.get(first + index).lock().payload.take() {
                    cmd.payload.free(payload);
                }
            }
            cmd.info.free(first);
        }
        self.sg_pool.free(state.sg_index);
        self.trans_pool.free(id.raw());
    }

    pub(crate) fn trans_push(
        &self,
        id: TransId,
        fragment: Fragment,
        info: Option<CmdInfo>,
    ) -> Result<()> {
        let mut state = self.slot(id).state.lock();
        if state.used >= state.tre_count {
            log::error!(
                "channel {}: transaction {:?} already holds {} fragments",
                self.id,
                id,
                state.tre_count
            );
            return Err(Error::TooManyFragments);
        }

        let index = state.used;
        if let Some(info) = info {
            let (Some(cmd), Some(first)) = (&self.cmd, state.info_index) else {
                log::error!("channel {}: command on a data transaction", self.id);
                return Err(Error::InvalidState);
            };
            let mut record = cmd.info.get(first + index).lock();
            record.opcode = info.opcode;
            record.direction = info.direction;
        }
        *self.sg_pool.get(state.sg_index + index).lock() = fragment;
        state.used += 1;

        Ok(())
    }

    /// Fill the payload slot of the next fragment of command transaction
    /// `id` with `bytes`, claiming a slot if the fragment has none yet
    pub(crate) fn cmd_payload_alloc(&self, id: TransId, bytes: &[u8]) -> Result<DmaAddr> {
        let Some(cmd) = &self.cmd else {
            log::error!("channel {}: no command pools", self.id);
            return Err(Error::InvalidState);
        };
        if bytes.len() > CMD_PAYLOAD_SIZE {
            return Err(Error::InvalidParameter);
        }

        let state = self.trans_state(id);
        let Some(first) = state.info_index else {
            log::error!("channel {}: payload for a data transaction", self.id);
            return Err(Error::InvalidState);
        };
        if state.used >= state.tre_count {
            log::error!(
                "channel {}: transaction {:?} has no fragment left for a payload",
                self.id,
                id
            );
            return Err(Error::TooManyFragments);
        }

        let mut record = cmd.info.get(first + state.used).lock();
        let slot = match record.payload {
            Some(slot) => slot,
            None => {
                let slot = cmd.payload.alloc()?;
                record.payload = Some(slot);
                slot
            }
        };
        cmd.payload.write(slot, bytes);
        Ok(slot.addr)
    }

    /// Command payload slots not owned by any transaction
    pub fn cmd_payload_avail(&self) -> Option<u32> {
        self.cmd.as_ref().map(|cmd| cmd.payload.available())
    }

    fn unmap_fragments(&self, state: &TransState) {
        if !state.direction.is_mapped() {
            return;
        }
        for index in 0..state.used {
            let fragment = *self.sg_pool.get(state.sg_index + index).lock();
            if fragment.mapped {
                self.platform
                    .unmap_single(fragment.addr, fragment.len, state.direction);
            }
        }
    }

    /// Free a transaction that was never committed
    pub(crate) fn trans_abandon(&self, id: TransId) {
        let state = self.trans_state(id);
        self.unmap_fragments(&state);
        self.trans_free(id);
    }

    // =========================================================================
    // COMMIT
    // =========================================================================

    fn trans_descriptors(&self, state: &TransState) -> (ArrayVec<Descriptor, TRANS_TRE_MAX>, u32) {
        let mut descriptors = ArrayVec::new();
        let mut bytes = 0u32;

        for index in 0..state.used {
            let fragment = *self.sg_pool.get(state.sg_index + index).lock();
            let (opcode, direction) = match (&self.cmd, state.info_index) {
                (Some(cmd), Some(first)) => {
                    let info = *cmd.info.get(first + index).lock();
                    (info.opcode, info.direction)
                }
                _ => (Opcode::NONE, state.direction),
            };
            bytes = bytes.wrapping_add(fragment.len);
            descriptors.push(Descriptor {
                addr: fragment.addr,
                len: fragment.len,
                opcode,
                direction,
                last: index + 1 == state.used,
            });
        }

        (descriptors, bytes)
    }

    pub(crate) fn trans_commit<T: Transport + ?Sized>(
        &self,
        transport: &T,
        id: TransId,
        ring_db: bool,
    ) {
        let state = self.trans_state(id);
        if state.used == 0 {
            self.trans_free(id);
            return;
        }
        let (descriptors, bytes) = self.trans_descriptors(&state);

        let _submit = self.submit.lock();
        if self.toward_ipa {
            let mut counters = self.counters.lock();
            let mut state = self.slot(id).state.lock();
            state.len = bytes;
            state.trans_count = counters.trans_count;
            state.byte_count = counters.byte_count;
            counters.trans_count += 1;
            counters.byte_count += u64::from(bytes);
        }
        self.lists.lock().move_tail(id, TransList::Pending);

        transport.submit(self, id, &descriptors, ring_db);
    }

    /// Report transmit work handed to hardware since the last report
    pub fn tx_queued(&self) {
        let (count, bytes) = {
            let mut counters = self.counters.lock();
            let count = counters.trans_count - counters.queued_trans_count;
            let bytes = counters.byte_count - counters.queued_byte_count;
            counters.queued_trans_count = counters.trans_count;
            counters.queued_byte_count = counters.byte_count;
            (count, bytes)
        };

        if count == 0 {
            return;
        }
        if let Some(client) = self.client.get() {
            client.tx_queued(self.id, count as u32, bytes as u32);
        }
    }

    // =========================================================================
    // COMPLETION
    // =========================================================================

    /// Record the newest transaction the transport reports finished
    pub(crate) fn update<T: Transport + ?Sized>(&self, transport: &T) {
        let Some(id) = transport.channel_update(self) else {
            return;
        };

        {
            let lists = self.lists.lock();
            if lists.owner.get(id.index()).copied().flatten() != Some(TransList::Pending) {
                log::debug!("channel {}: stale completion for {:?}", self.id, id);
                return;
            }
            self.slot(id).refcount.inc();
        }

        if self.toward_ipa {
            self.tx_completed(id);
        } else {
            self.rx_completed(id);
        }
        self.move_complete(id);
        self.trans_free(id);
    }

    fn tx_completed(&self, id: TransId) {
        let state = self.trans_state(id);
        let (count, bytes) = {
            let mut counters = self.counters.lock();
            let bytes = (state.byte_count + u64::from(state.len))
                .saturating_sub(counters.compl_byte_count);
            let count = (state.trans_count + 1).saturating_sub(counters.compl_trans_count);
            counters.compl_byte_count += bytes;
            counters.compl_trans_count += count;
            (count, bytes)
        };

        if let Some(client) = self.client.get() {
            client.tx_completed(self.id, count as u32, bytes as u32);
        }
    }

    fn rx_completed(&self, id: TransId) {
        let (count, bytes) = {
            let lists = self.lists.lock();
            let mut count = 0u64;
            let mut bytes = 0u64;
            let mut found = false;
            for &pending in &lists.pending {
                bytes += u64::from(self.slot(pending).state.lock().len);
                count += 1;
                if pending == id {
                    found = true;
                    break;
                }
            }
            if !found {
                return;
            }
            (count, bytes)
        };

        let mut counters = self.counters.lock();
        counters.trans_count += count;
        counters.byte_count += bytes;
    }

    /// Move `id` and every transaction before it to the completed list
    fn move_complete(&self, id: TransId) {
        let mut lists = self.lists.lock();
        let Some(pos) = lists.pending.iter().position(|&other| other == id) else {
            return;
        };
        let done: Vec<TransId> = lists.pending.drain(..=pos).collect();
        for done in done {
            lists.push(done, TransList::Completed);
        }
    }

    /// Move the oldest completed transaction to the polled list
    pub(crate) fn take_completed(&self) -> Option<TransId> {
        let mut lists = self.lists.lock();
        let id = lists.complete.pop_front()?;
        lists.push(id, TransList::Polled);
        Some(id)
    }

    /// Finalize a polled transaction
    pub(crate) fn trans_complete(&self, id: TransId) {
        let slot = self.slot(id);
        let state = self.trans_state(id);
        self.unmap_fragments(&state);

        if let Some(client) = self.client.get() {
            client.trans_complete(&self.report(id, &state));
        }
        slot.completion.complete();
        self.trans_free(id);
    }

    /// Drop one reference; the last one returns the transaction to its pool
    pub(crate) fn trans_free(&self, id: TransId) {
        let slot = self.slot(id);
        if slot.refcount.dec_not_one() {
            return;
        }

        {
            let mut lists = self.lists.lock();
            if !slot.refcount.dec_and_test() {
                return;
            }
            lists.remove(id);
        }

        let state = self.trans_state(id);
        if let Some(client) = self.client.get() {
            client.trans_release(&self.report(id, &state));
        }
        self.runs_free(id, &state);
        self.tre_release(state.tre_count);
    }

    /// Abandon everything pending: mark it cancelled and hand it to the
    /// poller
    pub fn cancel_pending(&self) {
        let cancelled = {
            let mut lists = self.lists.lock();
            let count = lists.pending.len();
            while let Some(id) = lists.pending.pop_front() {
                self.slot(id).cancelled.store(true, Ordering::Release);
                lists.push(id, TransList::Completed);
            }
            count
        };

        if cancelled > 0 {
            log::debug!("channel {}: cancelled {} transactions", self.id, cancelled);
            self.poll.schedule();
        }
    }

    fn report(&self, id: TransId, state: &TransState) -> TransReport {
        TransReport {
            channel_id: self.id,
            id,
            direction: state.direction,
            tre_count: state.tre_count,
            used: state.used,
            len: state.len,
            cancelled: self.slot(id).cancelled.load(Ordering::Acquire),
        }
    }

    // =========================================================================
    // TRANSPORT ACCESSORS
    // =========================================================================

    /// Pending transactions, oldest first
    pub fn pending_ids(&self) -> Vec<TransId> {
        self.lists.lock().pending.iter().copied().collect()
    }

    /// Bytes committed (transmit) or received
    pub fn trans_len(&self, id: TransId) -> u32 {
        self.slot(id).state.lock().len
    }

    /// Record the bytes hardware transferred
    pub fn set_trans_len(&self, id: TransId, len: u32) {
        self.slot(id).state.lock().len = len;
    }

    /// Sum of the fragment lengths
    pub fn trans_fragment_bytes(&self, id: TransId) -> u32 {
        let state = self.trans_state(id);
        (0..state.used)
            .map(|index| self.sg_pool.get(state.sg_index + index).lock().len)
            .fold(0u32, u32::wrapping_add)
    }

    /// Backend cookie recorded at submission
    pub fn trans_cookie(&self, id: TransId) -> u32 {
        self.slot(id).state.lock().cookie
    }

    /// Record a backend cookie
    pub fn set_trans_cookie(&self, id: TransId, cookie: u32) {
        self.slot(id).state.lock().cookie = cookie;
    }

    /// Whether hardware abandoned the transaction
    pub fn trans_cancelled(&self, id: TransId) -> bool {
        self.slot(id).cancelled.load(Ordering::Acquire)
    }

    /// Mark a transaction abandoned by hardware
    pub fn set_trans_cancelled(&self, id: TransId) {
        self.slot(id).cancelled.store(true, Ordering::Release);
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        let outstanding = self.lists.get_mut().outstanding();
        if outstanding > 0 {
            log::warn!(
                "channel {}: released with {} transactions outstanding",
                self.id,
                outstanding
            );
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("toward_ipa", &self.toward_ipa)
            .field("tre_max", &self.tre_max)
            .field("trans_tre_max", &self.trans_tre_max)
            .field("tre_avail", &self.tre_avail())
            .field("command", &self.cmd.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use ipa_hal::host::HostPlatform;

    use super::*;
    use crate::mock::{cmd_channel, data_channel, MockTransport, RecordingClient};
    use crate::transport::TransportExt;

    const TX: ChannelId = ChannelId::new(0);
    const RX: ChannelId = ChannelId::new(1);

    fn commit(
        transport: &MockTransport,
        channel_id: ChannelId,
        len: u32,
        batched: bool,
    ) -> TransId {
        let direction = if transport.channel(channel_id).toward_ipa() {
            DmaDirection::ToDevice
        } else {
            DmaDirection::FromDevice
        };
        let mut trans = transport
            .channel_trans_alloc(channel_id, 1, direction)
            .unwrap();
        trans.add_mapped(DmaAddr::new(0x2000_0000), len).unwrap();
        let id = trans.id();
        if batched {
            trans.commit_batched();
        } else {
            trans.commit();
        }
        id
    }

    #[test]
    fn test_config_validation() {
        let platform: Arc<dyn DmaPlatform> = Arc::new(HostPlatform::new());

        let mut config = data_channel(0, true, 8, 0);
        assert!(matches!(
            Channel::new(platform.clone(), config),
            Err(Error::InvalidParameter)
        ));

        config.trans_tre_max = TRANS_TRE_MAX as u32 + 1;
        assert!(matches!(
            Channel::new(platform.clone(), config),
            Err(Error::InvalidParameter)
        ));

        // More descriptors per transaction than the channel holds
        let config = data_channel(0, true, 2, 4);
        assert!(matches!(
            Channel::new(platform.clone(), config),
            Err(Error::Capacity)
        ));

        let mut config = cmd_channel(0, 8, 4);
        config.cmd_pool = Some(CmdPoolConfig {
            count: 8,
            max_alloc: 2,
        });
        assert!(matches!(
            Channel::new(platform.clone(), config),
            Err(Error::InvalidParameter)
        ));

        // Fewer payload slots than descriptors
        config.cmd_pool = Some(CmdPoolConfig {
            count: 4,
            max_alloc: 4,
        });
        assert!(matches!(
            Channel::new(platform.clone(), config),
            Err(Error::InvalidParameter)
        ));

        let channel = Channel::new(platform, cmd_channel(0, 8, 4)).unwrap();
        assert!(channel.has_cmd_pool());
        assert_eq!(channel.tre_avail(), 8);
    }

    #[test]
    fn test_tx_delta_accounting() {
        let transport = MockTransport::new(&[data_channel(0, true, 128, 1)]);
        let channel = transport.channel(TX);
        let client = Arc::new(RecordingClient::default());
        channel.set_client(client.clone()).unwrap();

        let ids: Vec<TransId> = (0..100).map(|_| commit(&transport, TX, 500, false)).collect();
        assert_eq!(channel.counters().trans_count, 100);
        assert_eq!(channel.counters().byte_count, 50_000);

        let mut start = 0;
        for batch in [10, 20, 70] {
            for &id in &ids[start..start + batch] {
                transport.finish(TX, id, 0);
            }
            start += batch;
            assert_eq!(transport.channel_poll(TX, 128).unwrap(), batch as u32);
        }

        assert_eq!(
            *client.tx_completed.lock(),
            [(10, 5_000), (20, 10_000), (70, 35_000)]
        );
        let counters = channel.counters();
        assert_eq!(counters.compl_trans_count, 100);
        assert_eq!(counters.compl_byte_count, 50_000);
    }

    #[test]
    fn test_tx_queued_reports_delta() {
        let transport = MockTransport::new(&[data_channel(0, true, 8, 1)]);
        let channel = transport.channel(TX);
        let client = Arc::new(RecordingClient::default());
        channel.set_client(client.clone()).unwrap();

        commit(&transport, TX, 100, true);
        commit(&transport, TX, 300, true);
        assert!(client.queued.lock().is_empty());
        assert!(transport.submissions().iter().all(|s| !s.ring_db));

        channel.tx_queued();
        channel.tx_queued();
        assert_eq!(*client.queued.lock(), [(2, 400)]);

        commit(&transport, TX, 50, false);
        assert_eq!(*client.queued.lock(), [(2, 400), (1, 50)]);
    }

    #[test]
    fn test_rx_counters() {
        let transport = MockTransport::new(&[data_channel(1, false, 8, 1)]);
        let channel = transport.channel(RX);

        let ids: Vec<TransId> = (0..3).map(|_| commit(&transport, RX, 2048, false)).collect();
        for (&id, len) in ids.iter().zip([100, 200, 300]) {
            transport.finish(RX, id, len);
        }
        assert_eq!(transport.channel_poll(RX, 8).unwrap(), 3);

        let counters = channel.counters();
        assert_eq!(counters.trans_count, 3);
        assert_eq!(counters.byte_count, 600);
    }

    #[test]
    fn test_cancel_pending() {
        let transport = MockTransport::new(&[data_channel(0, true, 8, 1)]);
        let channel = transport.channel(TX);
        let client = Arc::new(RecordingClient::default());
        channel.set_client(client.clone()).unwrap();

        for _ in 0..3 {
            commit(&transport, TX, 10, false);
        }
        transport.channel_reset(TX, false);

        assert_eq!(channel.list_len(TransList::Pending), 0);
        assert_eq!(channel.list_len(TransList::Completed), 3);
        assert!(channel.poll_handle().is_scheduled());

        assert_eq!(transport.channel_poll(TX, 8).unwrap(), 3);
        assert!(client.completed.lock().iter().all(|r| r.cancelled));
        assert_eq!(channel.tre_avail(), 8);
        assert!(!channel.poll_handle().is_scheduled());
    }

    #[test]
    fn test_stale_completion_ignored() {
        let transport = MockTransport::new(&[data_channel(0, true, 8, 1)]);
        let channel = transport.channel(TX);

        let id = commit(&transport, TX, 10, false);
        channel.cancel_pending();
        assert_eq!(transport.channel_poll(TX, 8).unwrap(), 1);

        // Hardware reports the cancelled transaction after it was retired
        transport.finish(TX, id, 0);
        assert_eq!(transport.channel_poll(TX, 8).unwrap(), 0);
        assert_eq!(channel.tre_avail(), 8);
    }

    #[test]
    fn test_client_bound_once() {
        let transport = MockTransport::new(&[data_channel(0, true, 8, 1)]);
        let channel = transport.channel(TX);

        channel
            .set_client(Arc::new(RecordingClient::default()))
            .unwrap();
        assert_eq!(
            channel.set_client(Arc::new(RecordingClient::default())),
            Err(Error::InvalidState)
        );
    }

    #[test]
    fn test_trans_list_tracking() {
        let transport = MockTransport::new(&[data_channel(0, true, 8, 1)]);
        let channel = transport.channel(TX);

        let id = commit(&transport, TX, 10, false);
        assert_eq!(channel.trans_list(id), Some(TransList::Pending));
        assert_eq!(channel.pending_ids(), [id]);
        assert_eq!(channel.trans_fragment_bytes(id), 10);

        transport.finish(TX, id, 0);
        transport.channel_poll(TX, 8).unwrap();
        assert_eq!(channel.trans_list(id), None);
    }
}
