//! # Recording Client
//!
//! A [`TransClient`] that keeps every hook invocation for later
//! inspection.

use std::vec::Vec;

use spin::Mutex;

use ipa_core::ChannelId;
use ipa_trans::{TransClient, TransReport};

/// Transmit progress report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReport {
    /// Channel
    pub channel_id: ChannelId,
    /// Transactions since the previous report
    pub count: u32,
    /// Bytes since the previous report
    pub bytes: u32,
}

/// Client recording every callback
#[derive(Debug, Default)]
pub struct RecordingClient {
    completed: Mutex<Vec<TransReport>>,
    released: Mutex<Vec<TransReport>>,
    queued: Mutex<Vec<TxReport>>,
    tx_completed: Mutex<Vec<TxReport>>,
}

impl RecordingClient {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Completion reports in order
    pub fn completed(&self) -> Vec<TransReport> {
        self.completed.lock().clone()
    }

    /// Release reports in order
    pub fn released(&self) -> Vec<TransReport> {
        self.released.lock().clone()
    }

    /// Transmit queued reports in order
    pub fn queued(&self) -> Vec<TxReport> {
        self.queued.lock().clone()
    }

    /// Transmit completed reports in order
    pub fn tx_completed(&self) -> Vec<TxReport> {
        self.tx_completed.lock().clone()
    }

    /// Sum of transmit completion reports as `(count, bytes)`
    pub fn tx_completed_total(&self) -> (u32, u32) {
        self.tx_completed
            .lock()
            .iter()
            .fold((0, 0), |(count, bytes), report| {
                (count + report.count, bytes + report.bytes)
            })
    }
}

impl TransClient for RecordingClient {
    fn trans_complete(&self, report: &TransReport) {
        self.completed.lock().push(*report);
    }

    fn trans_release(&self, report: &TransReport) {
        self.released.lock().push(*report);
    }

    fn tx_queued(&self, channel_id: ChannelId, count: u32, bytes: u32) {
        self.queued.lock().push(TxReport {
            channel_id,
            count,
            bytes,
        });
    }

    fn tx_completed(&self, channel_id: ChannelId, count: u32, bytes: u32) {
        self.tx_completed.lock().push(TxReport {
            channel_id,
            count,
            bytes,
        });
    }
}
