//! # IPA Error Handling
//!
//! Error types for the IPA driver stack.
//!
//! Error handling follows these principles:
//! - Errors are typed and categorized
//! - Reservation bugs are reported close to the call site
//! - Errors are `no_std` compatible

use core::fmt;

// =============================================================================
// RESULT TYPE
// =============================================================================

/// IPA Result type alias
pub type Result<T> = core::result::Result<T, Error>;

// =============================================================================
// ERROR ENUM
// =============================================================================

/// IPA unified error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Generic Errors
    // =========================================================================
    /// Invalid parameter provided
    InvalidParameter,
    /// Operation timed out
    Timeout,
    /// Resource is busy, try again later
    Busy,
    /// Object is not in a state that allows the operation
    InvalidState,

    // =========================================================================
    // Resource Errors
    // =========================================================================
    /// Channel descriptor reservation or pool exhausted
    Capacity,
    /// A transaction was given more fragments than it reserved
    TooManyFragments,
    /// Out of system memory
    OutOfMemory,
    /// DMA mapping of a buffer failed
    MappingFailed,

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Channel is not configured on this transport
    ChannelNotFound(u32),
    /// Operation has no hardware equivalent on this transport
    HardwareUnsupported,
    /// Hardware reported a failure
    HardwareFault,

    // =========================================================================
    // Command Errors
    // =========================================================================
    /// A memory region does not fit a command field
    RegionOutOfRange,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Generic
            Self::InvalidParameter => write!(f, "invalid parameter"),
            Self::Timeout => write!(f, "operation timed out"),
            Self::Busy => write!(f, "resource busy"),
            Self::InvalidState => write!(f, "invalid state"),

            // Resource
            Self::Capacity => write!(f, "channel capacity exhausted"),
            Self::TooManyFragments => write!(f, "too many fragments for transaction"),
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::MappingFailed => write!(f, "DMA mapping failed"),

            // Transport
            Self::ChannelNotFound(id) => write!(f, "channel {} not found", id),
            Self::HardwareUnsupported => write!(f, "operation not supported by hardware"),
            Self::HardwareFault => write!(f, "hardware fault"),

            // Command
            Self::RegionOutOfRange => write!(f, "memory region out of range"),
        }
    }
}
