//! # IPA Hardware Abstraction Layer
//!
//! Platform services consumed by the IPA transaction engine:
//!
//! - **Coherent memory**: descriptor rings and command payload pools that
//!   both the CPU and the IPA access without explicit synchronization
//! - **Streaming mapping**: data buffers mapped for one transfer and
//!   unmapped on completion
//! - **Timing**: a monotonic clock and a sleep primitive for timed waits
//!   and hardware retries
//!
//! The `std` feature adds [`host::HostPlatform`], a heap-backed platform used
//! to simulate the hardware on a development machine.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod dma;
#[cfg(feature = "std")]
pub mod host;
pub mod platform;

pub use dma::CoherentMemory;
pub use platform::{arch, DmaPlatform, PAGE_SIZE};
