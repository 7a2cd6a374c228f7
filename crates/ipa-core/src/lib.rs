//! # IPA Core
//!
//! Foundational types, errors and synchronization primitives shared by every
//! crate of the IPA transaction engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        ipa-core                             │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │   Types     │  │   Version   │  │   Sync              │  │
//! │  │ (DmaAddr,   │  │ (IpaVersion │  │ (Completion,        │  │
//! │  │  ChannelId) │  │  Transport) │  │  RefCount)          │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! │                   ┌─────────────────────┐                   │
//! │                   │  Error / Result     │                   │
//! │                   └─────────────────────┘                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

#[cfg(feature = "std")]
extern crate std;

// =============================================================================
// MODULE EXPORTS
// =============================================================================

pub mod error;
pub mod sync;
pub mod types;
pub mod version;

// Re-exports for convenience
pub use error::{Error, Result};
pub use sync::{Completion, RefCount};
pub use types::*;
pub use version::{CmdLayout, IpaVersion, TransportKind};
