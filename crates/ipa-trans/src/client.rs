//! # Transaction Clients
//!
//! Upper-layer hooks invoked by a channel as its transactions move through
//! the completion path. Endpoint code implements [`TransClient`] to learn
//! about finished receive buffers and transmit progress.

use ipa_core::{ChannelId, DmaDirection};

use crate::trans::TransId;

/// Snapshot of a transaction handed to client hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransReport {
    /// Owning channel
    pub channel_id: ChannelId,
    /// Transaction slot
    pub id: TransId,
    /// DMA direction
    pub direction: DmaDirection,
    /// Fragments reserved at allocation
    pub tre_count: u32,
    /// Fragments actually used
    pub used: u32,
    /// Bytes transferred (receive) or committed (transmit)
    pub len: u32,
    /// Hardware was told to abandon the transaction
    pub cancelled: bool,
}

/// Transaction event sink
///
/// All hooks run in the context that drives the event (committer or
/// poller) without any channel lock held. They default to no-ops.
pub trait TransClient: Send + Sync {
    /// A transaction finished and is about to signal its waiter
    fn trans_complete(&self, report: &TransReport) {
        let _ = report;
    }

    /// A transaction dropped its last reference and left its channel
    fn trans_release(&self, report: &TransReport) {
        let _ = report;
    }

    /// Transmit work was handed to hardware since the previous report
    fn tx_queued(&self, channel_id: ChannelId, count: u32, bytes: u32) {
        let _ = (channel_id, count, bytes);
    }

    /// Transmit work completed since the previous report
    fn tx_completed(&self, channel_id: ChannelId, count: u32, bytes: u32) {
        let _ = (channel_id, count, bytes);
    }
}
