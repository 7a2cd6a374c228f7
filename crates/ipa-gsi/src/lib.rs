//! # GSI Transport
//!
//! The generic software interface ring engine fronting IPA v3.0 and later.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         ipa-gsi                              │
//! │                                                              │
//! │  Trans ──commit──► GsiTransport::submit                      │
//! │                      │  Tre::fill per descriptor             │
//! │                      ▼                                       │
//! │               ┌──────────────┐  doorbell   ┌──────────────┐  │
//! │               │ transfer ring│────────────►│ GsiHardware  │  │
//! │               └──────────────┘             └──────┬───────┘  │
//! │                      ▲                      events│          │
//! │   channel_update ◄───┴── map[last element] ◄──────┘          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Register access is abstracted by [`GsiHardware`]; ring memory comes
//! from the platform's coherent allocator.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod gsi;
pub mod hw;
pub mod tre;

pub use gsi::GsiTransport;
pub use hw::{ChannelCommand, GsiEvent, GsiHardware, GSI_CHANNEL_COUNT_MAX, GSI_TLV_MAX};
pub use tre::{Tre, TreFlags, TreType, TRE_SIZE};
