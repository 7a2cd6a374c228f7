//! # IPA Immediate Commands
//!
//! Builders for the immediate commands the AP sends to the IPA over its
//! command channel.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        CmdEncoder                                │
//! │   version ─► CmdLayout::Legacy (v2.x)   CmdLayout::Current (v3+) │
//! │                    │                           │                 │
//! │            payload::legacy::*          payload::current::*       │
//! │                    └─────────────┬─────────────┘                 │
//! │                                  ▼                               │
//! │            command pool slot + Trans::add_command                │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - `validate`: region and register offset checks against the widths of
//!   the command fields

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod encoder;
pub mod opcode;
pub mod payload;
pub mod region;
#[cfg(feature = "validate")]
pub mod validate;

#[cfg(test)]
mod testing;

// Re-exports
pub use encoder::{CmdConfig, CmdEncoder, TableLocation, TAG_PROCESS_COUNT};
pub use opcode::{register_write_opcode, CmdOpcode, PipelineClear, TableKind};
pub use payload::{IpPacketInit, PAYLOAD_UNION_SIZE};
pub use region::{MemId, MemRegion};
