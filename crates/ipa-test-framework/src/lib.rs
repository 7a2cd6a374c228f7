//! # IPA Test Framework
//!
//! Hardware stand-ins and helpers for exercising the IPA transports
//! without a device.
//!
//! - [`MockGsiHardware`]: GSI register file for [`ipa_gsi::GsiTransport`]
//! - [`MockDmaEngine`]: slave DMA engine for [`ipa_bam::BamTransport`]
//! - [`RecordingClient`]: transaction client recording every callback
//!
//! Host memory comes from [`ipa_hal::host::HostPlatform`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bam;
pub mod client;
pub mod gsi;

pub use bam::{MockChan, MockDmaEngine, PreparedDesc};
pub use client::{RecordingClient, TxReport};
pub use gsi::{MockGsiHardware, ProgrammedChannel};

use core::sync::atomic::{AtomicBool, Ordering};

use ipa_core::{ChannelId, Result};
use ipa_trans::{Transport, TransportExt};

/// Poll budget used by [`drain`]
pub const DRAIN_BUDGET: u32 = 64;

/// Poll a channel until a pass finalizes nothing; returns the total
pub fn drain<T: Transport + ?Sized>(transport: &T, channel_id: ChannelId) -> Result<u32> {
    let mut total = 0;
    loop {
        let count = transport.channel_poll(channel_id, DRAIN_BUDGET)?;
        if count == 0 {
            return Ok(total);
        }
        total += count;
    }
}

/// Poll a channel from the calling thread until it has nothing
/// outstanding. Pair with a blocking commit on another thread.
pub fn poll_until_idle<T: Transport + ?Sized>(transport: &T, channel_id: ChannelId) -> Result<()> {
    let channel = transport.base().channel(channel_id)?;
    while channel.outstanding() > 0 {
        transport.channel_poll(channel_id, DRAIN_BUDGET)?;
        std::thread::yield_now();
    }
    Ok(())
}

/// Run `f` while another thread keeps polling a channel.
///
/// Blocking commits complete only when someone polls; this stands in for
/// the scheduler that would.
pub fn with_poller<T, R>(transport: &T, channel_id: ChannelId, f: impl FnOnce() -> R) -> R
where
    T: Transport + ?Sized,
{
    let done = AtomicBool::new(false);
    std::thread::scope(|scope| {
        scope.spawn(|| {
            while !done.load(Ordering::Acquire) {
                if transport.channel_poll(channel_id, DRAIN_BUDGET).is_err() {
                    break;
                }
                std::thread::yield_now();
            }
        });
        let result = f();
        done.store(true, Ordering::Release);
        result
    })
}
