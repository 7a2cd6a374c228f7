//! # IPA Core Types
//!
//! Fundamental type definitions used across the driver stack.
//!
//! These types provide:
//! - Strong typing for DMA addresses versus host addresses
//! - Channel and endpoint identifiers
//! - DMA direction and descriptor opcode values

use core::fmt;
use core::ops::Add;

// =============================================================================
// LIMITS
// =============================================================================

/// Maximum number of channels any transport may expose
pub const IPA_CHANNEL_COUNT_MAX: usize = 20;

/// Largest number of descriptors a single transaction may carry
pub const TRANS_TRE_MAX: usize = 64;

// =============================================================================
// DMA ADDRESS
// =============================================================================

/// Bus address as seen by the IPA hardware.
///
/// It is NOT a CPU pointer and cannot be dereferenced directly.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct DmaAddr(u64);

impl DmaAddr {
    /// Create a new DMA address
    #[inline]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Create a null DMA address
    #[inline]
    pub const fn null() -> Self {
        Self(0)
    }

    /// Get the raw u64 value
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Check if null
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Offset by bytes
    #[inline]
    pub const fn offset(self, bytes: u64) -> Self {
        Self(self.0.wrapping_add(bytes))
    }
}

impl Add<u64> for DmaAddr {
    type Output = Self;

    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0.wrapping_add(rhs))
    }
}

impl fmt::Debug for DmaAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DmaAddr(0x{:016x})", self.0)
    }
}

impl fmt::Display for DmaAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

// =============================================================================
// HOST BUFFER
// =============================================================================

/// A host memory region handed to the platform for streaming DMA mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HostBuffer {
    /// CPU virtual address of the first byte
    pub virt: usize,
    /// Length in bytes
    pub len: u32,
}

impl HostBuffer {
    /// Describe a region
    pub const fn new(virt: usize, len: u32) -> Self {
        Self { virt, len }
    }

    /// Describe an existing slice
    pub fn from_slice(buf: &[u8]) -> Self {
        Self {
            virt: buf.as_ptr() as usize,
            len: buf.len() as u32,
        }
    }
}

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Hardware channel identifier
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct ChannelId(u8);

impl ChannelId {
    /// Create from a raw channel number
    #[inline]
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// Raw channel number
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0 as u32
    }

    /// Index into per-channel tables
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelId({})", self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// IPA endpoint identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct EndpointId(u8);

impl EndpointId {
    /// Create from a raw endpoint number
    #[inline]
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// Raw endpoint number
    #[inline]
    pub const fn raw(self) -> u8 {
        self.0
    }
}

// =============================================================================
// DMA DIRECTION
// =============================================================================

/// Direction of a DMA transfer relative to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DmaDirection {
    /// Host memory is read by the device
    ToDevice,
    /// Host memory is written by the device
    FromDevice,
    /// No streaming mapping (coherent memory)
    #[default]
    None,
}

impl DmaDirection {
    /// Whether buffers in this direction are streaming-mapped
    #[inline]
    pub const fn is_mapped(self) -> bool {
        !matches!(self, Self::None)
    }
}

// =============================================================================
// DESCRIPTOR OPCODE
// =============================================================================

/// Raw immediate command opcode carried by a descriptor.
///
/// Data transfers use [`Opcode::NONE`]; command descriptors carry the
/// opcode in place of the transfer length.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Opcode(u16);

impl Opcode {
    /// Plain data transfer
    pub const NONE: Self = Self(0);

    /// Create from a raw encoded opcode
    #[inline]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Raw encoded opcode
    #[inline]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Check for a plain data transfer
    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opcode(0x{:04x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dma_addr_offset() {
        let addr = DmaAddr::new(0x1000);
        assert_eq!(addr.offset(0x20).raw(), 0x1020);
        assert_eq!((addr + 8).raw(), 0x1008);
        assert!(DmaAddr::null().is_null());
    }

    #[test]
    fn test_direction_mapping() {
        assert!(DmaDirection::ToDevice.is_mapped());
        assert!(DmaDirection::FromDevice.is_mapped());
        assert!(!DmaDirection::None.is_mapped());
    }

    #[test]
    fn test_opcode_none() {
        assert!(Opcode::NONE.is_none());
        assert!(!Opcode::new(12).is_none());
    }
}
