//! # Mock GSI Hardware
//!
//! Register-level GSI stand-in. Records every command, doorbell and
//! interrupt mask change; completion events are injected by the test or
//! generated on each doorbell in auto-complete mode.

use std::vec::Vec;

use spin::Mutex;

use ipa_core::{ChannelId, DmaAddr, Error, Result};
use ipa_gsi::{ChannelCommand, GsiEvent, GsiHardware};

/// A channel context as last programmed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgrammedChannel {
    /// Channel
    pub channel_id: ChannelId,
    /// Ring base
    pub ring: DmaAddr,
    /// Ring elements
    pub tre_count: u32,
    /// Doorbell engine enabled
    pub doorbell: bool,
}

#[derive(Debug, Default)]
struct Registers {
    programmed: Vec<ProgrammedChannel>,
    commands: Vec<(ChannelId, ChannelCommand)>,
    doorbells: Vec<(ChannelId, u32)>,
    events: Vec<(ChannelId, GsiEvent)>,
    irq: Vec<(ChannelId, bool)>,
    stop_busy: u32,
    auto_complete: bool,
}

/// Recording GSI register file
#[derive(Debug, Default)]
pub struct MockGsiHardware {
    regs: Mutex<Registers>,
}

impl MockGsiHardware {
    /// Create an idle register file
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise a completion event for every doorbell from now on
    pub fn set_auto_complete(&self, enable: bool) {
        self.regs.lock().auto_complete = enable;
    }

    /// Report the next `count` stop commands as busy
    pub fn stop_busy(&self, count: u32) {
        self.regs.lock().stop_busy = count;
    }

    /// Queue a completion event naming ring element `tre_index`
    pub fn complete(&self, channel_id: ChannelId, tre_index: u32, len: u32) {
        self.regs
            .lock()
            .events
            .push((channel_id, GsiEvent { tre_index, len }));
    }

    /// Complete everything up to the channel's last doorbell.
    ///
    /// Returns false when the channel never rang.
    pub fn complete_to_doorbell(&self, channel_id: ChannelId, len: u32) -> bool {
        let Some(index) = self.last_doorbell(channel_id) else {
            return false;
        };
        self.complete(channel_id, index.wrapping_sub(1), len);
        true
    }

    /// Most recent doorbell index of a channel
    pub fn last_doorbell(&self, channel_id: ChannelId) -> Option<u32> {
        self.regs
            .lock()
            .doorbells
            .iter()
            .rev()
            .find(|(c, _)| *c == channel_id)
            .map(|(_, index)| *index)
    }

    /// Doorbells rung on a channel
    pub fn doorbell_count(&self, channel_id: ChannelId) -> usize {
        self.regs
            .lock()
            .doorbells
            .iter()
            .filter(|(c, _)| *c == channel_id)
            .count()
    }

    /// Channel commands in issue order
    pub fn commands(&self) -> Vec<(ChannelId, ChannelCommand)> {
        self.regs.lock().commands.clone()
    }

    /// Channel contexts in programming order
    pub fn programmed(&self) -> Vec<ProgrammedChannel> {
        self.regs.lock().programmed.clone()
    }

    /// Current interrupt mask state of a channel
    pub fn irq_enabled(&self, channel_id: ChannelId) -> bool {
        self.regs
            .lock()
            .irq
            .iter()
            .rev()
            .find(|(c, _)| *c == channel_id)
            .is_some_and(|(_, enabled)| *enabled)
    }
}

impl GsiHardware for MockGsiHardware {
    fn channel_program(
        &self,
        channel_id: ChannelId,
        ring: DmaAddr,
        tre_count: u32,
        _event_count: u32,
        doorbell: bool,
    ) -> Result<()> {
        self.regs.lock().programmed.push(ProgrammedChannel {
            channel_id,
            ring,
            tre_count,
            doorbell,
        });
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
        let mut regs = self.regs.lock();
        regs.doorbells.push((channel_id, index));
        if regs.auto_complete {
            let event = GsiEvent {
                tre_index: index.wrapping_sub(1),
                len: 0,
            };
            regs.events.push((channel_id, event));
        }
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
