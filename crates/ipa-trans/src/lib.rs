//! # IPA Transaction Engine
//!
//! Transactions, channels and completion polling shared by both IPA
//! transports.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                      Transaction Pipeline                          │
//! │                                                                    │
//! │  ┌──────────────┐    ┌──────────────┐    ┌───────────────────┐     │
//! │  │    Trans     │    │   Channel    │    │     Transport     │     │
//! │  │  (fragments, │───▶│  (lists,     │───▶│  (GSI ring or     │     │
//! │  │   commands)  │    │   counters)  │    │   BAM engine)     │     │
//! │  └──────────────┘    └──────┬───────┘    └─────────┬─────────┘     │
//! │                             │                      │               │
//! │                      ┌──────▼───────┐     newest finished          │
//! │                      │    Poller    │◀─────────────┘               │
//! │                      │  (budgeted)  │                              │
//! │                      └──────────────┘                              │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//!
//! 1. A caller allocates a [`Trans`] from a channel, reserving descriptors
//! 2. Fragments or immediate commands are appended
//! 3. Commit hands the descriptors to the [`Transport`]
//! 4. The poller asks the transport what finished and finalizes it
//! 5. The last reference returns the transaction to its pools

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod channel;
pub mod client;
pub mod data;
pub mod poll;
pub mod pool;
pub mod trans;
pub mod transport;

#[cfg(test)]
mod mock;

// Re-exports
pub use channel::{
    Channel, ChannelConfig, ChannelCounters, CmdPoolConfig, TransList, CMD_PAYLOAD_SIZE,
};
pub use client::{TransClient, TransReport};
pub use data::{ChannelData, EndpointData, ExecEnv};
pub use poll::PollHandle;
pub use pool::{DmaPool, DmaSlot, Recycle, ResourcePool};
pub use trans::{Trans, TransId};
pub use transport::{Descriptor, Transport, TransportBase, TransportExt};
