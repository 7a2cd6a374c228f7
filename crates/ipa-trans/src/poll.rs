//! # Completion Polling
//!
//! Budgeted completion processing driven by an external scheduler.
//!
//! A hardware notification calls [`Channel::notify`], which marks the
//! channel's [`PollHandle`] scheduled. The scheduler then calls
//! [`Channel::poll`] until a pass finds fewer completions than its budget,
//! at which point the handle deactivates itself. A notification arriving
//! while a pass runs is remembered and keeps the handle scheduled for one
//! more pass.

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

use crate::channel::Channel;
use crate::trans::TransId;
use crate::transport::Transport;

const SCHED: u8 = 1 << 0;
const MISSED: u8 = 1 << 1;
const DISABLED: u8 = 1 << 2;

// =============================================================================
// POLL HANDLE
// =============================================================================

/// Scheduling state of one channel's poller
pub struct PollHandle {
    state: AtomicU8,
}

impl PollHandle {
    /// Create an enabled, idle handle
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(0),
        }
    }

    /// Request a poll pass.
    ///
    /// Returns `true` if the handle went from idle to scheduled.
    pub fn schedule(&self) -> bool {
        let mut scheduled = false;
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                scheduled = false;
                if state & DISABLED != 0 {
                    None
                } else if state & SCHED != 0 {
                    Some(state | MISSED)
                } else {
                    scheduled = true;
                    Some(state | SCHED)
                }
            });
        scheduled
    }

    /// Finish a pass that ran out of work.
    ///
    /// Returns `false` if a notification arrived meanwhile; the handle then
    /// stays scheduled.
    pub fn complete(&self) -> bool {
        let mut idle = false;
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                if state & MISSED != 0 {
                    idle = false;
                    Some(state & !MISSED)
                } else {
                    idle = true;
                    Some(state & !SCHED)
                }
            });
        idle
    }

    /// Allow scheduling again
    pub fn enable(&self) {
        self.state.fetch_and(!DISABLED, Ordering::AcqRel);
    }

    /// Refuse scheduling and drop any pending request
    pub fn disable(&self) {
        self.state.store(DISABLED, Ordering::Release);
    }

    /// Whether a pass is requested
    #[inline]
    pub fn is_scheduled(&self) -> bool {
        self.state.load(Ordering::Acquire) & SCHED != 0
    }

    /// Whether scheduling is allowed
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.state.load(Ordering::Acquire) & DISABLED == 0
    }
}

impl Default for PollHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PollHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollHandle")
            .field("scheduled", &self.is_scheduled())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

// =============================================================================
// POLL LOOP
// =============================================================================

impl Channel {
    /// Hardware signaled progress; request a poll pass
    pub fn notify(&self) -> bool {
        self.poll.schedule()
    }

    /// Return the oldest completed transaction, asking the transport for
    /// news only when none is waiting
    pub(crate) fn poll_one<T: Transport + ?Sized>(&self, transport: &T) -> Option<TransId> {
        if let Some(id) = self.take_completed() {
            return Some(id);
        }
        self.update(transport);
        self.take_completed()
    }

    /// Finalize up to `budget` completed transactions.
    ///
    /// Returns the number finalized. A pass finding fewer than `budget`
    /// deactivates the poll handle.
    pub fn poll<T: Transport + ?Sized>(&self, transport: &T, budget: u32) -> u32 {
        let mut count = 0;
        while count < budget {
            let Some(id) = self.poll_one(transport) else {
                break;
            };
            self.trans_complete(id);
            count += 1;
        }

        if count < budget {
            self.poll.complete();
        }
        count
    }
}
