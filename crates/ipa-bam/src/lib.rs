//! # BAM Transport
//!
//! The bus access manager DMA engine fronting IPA v2.x.
//!
//! ```text
//!   Trans ──commit──► BamTransport::submit ──prep──► DmaEngine pipe
//!                                                       │
//!   channel_update ◄── tx_status(cookie), oldest first ◄┘
//! ```
//!
//! The engine itself is external and abstracted by [`DmaEngine`].

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod bam;
pub mod engine;

pub use bam::{BamTransport, BAM_CHANNEL_COUNT_MAX};
pub use engine::{
    DmaEngine, DmaStatus, PrepFlags, SlaveConfig, TransferDirection, TxState, BAM_MAX_BURST_SIZE,
};
