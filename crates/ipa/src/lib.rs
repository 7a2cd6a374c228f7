//! # IPA Driver Core
//!
//! Ties the transaction engine, the two transports and the command encoder
//! together behind one driver object.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                              Ipa                                 │
//! │                                                                  │
//! │   IpaData ──version──► Backend::Gsi(GsiTransport)   (v3.0+)      │
//! │   (platform table)         or Backend::Bam(BamTransport) (v2.x)  │
//! │                                  │                               │
//! │   CmdEncoder ──commands──► command channel ──► channel_poll      │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let ipa = Ipa::new(platform, &data::msm8953::DATA, Hardware::Bam(engine), config)?;
//! ipa.setup()?;
//! ipa.tag_process()?;
//! ```
//!
//! ## Features
//!
//! - `std`: hosted build; required by the test tooling
//! - `validate`: check platform memory regions at initialization

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod backend;
pub mod data;
pub mod driver;

// Re-exports
pub use backend::{Backend, Hardware};
pub use data::{IpaData, MemData, AP_LAN_RX};
pub use driver::Ipa;

pub use ipa_cmd::{CmdConfig, CmdEncoder};
pub use ipa_core::{ChannelId, EndpointId, Error, IpaVersion, Result, TransportKind};
pub use ipa_trans::{Transport, TransportExt};
