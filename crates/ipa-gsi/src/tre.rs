//! # Transfer Ring Elements
//!
//! The 16-byte descriptor format of a GSI transfer ring.
//!
//! ```text
//!   byte  0                8        10       12                16
//!         ┌────────────────┬────────┬────────┬─────────────────┐
//!         │ addr (le64)    │ len or │reserved│ flags (le32)    │
//!         │                │ opcode │        │ type in 23:16   │
//!         └────────────────┴────────┴────────┴─────────────────┘
//! ```

use static_assertions::const_assert_eq;

use ipa_core::{DmaAddr, Opcode};
use ipa_trans::Descriptor;

/// Size of one ring element
pub const TRE_SIZE: usize = 16;

const_assert_eq!(TRE_SIZE, 8 + 2 + 2 + 4);

const TYPE_SHIFT: u32 = 16;
const TYPE_MASK: u32 = 0xff << TYPE_SHIFT;

bitflags::bitflags! {
    /// Ring element control bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TreFlags: u32 {
        /// More elements of the same transaction follow
        const CHAIN = 1 << 0;
        /// Interrupt at end of transfer
        const IEOT = 1 << 9;
        /// Block the event interrupt
        const BEI = 1 << 10;
    }
}

/// Ring element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TreType {
    /// Data transfer
    Xfer = 2,
    /// Immediate command
    ImmdCmd = 3,
}

impl TreType {
    fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            2 => Some(Self::Xfer),
            3 => Some(Self::ImmdCmd),
            _ => None,
        }
    }
}

/// Decoded transfer ring element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tre {
    /// Buffer or payload address
    pub addr: DmaAddr,
    /// Transfer length, or the opcode for commands
    pub len_opcode: u16,
    /// Control bits
    pub flags: TreFlags,
    /// Element type
    pub tre_type: TreType,
}

impl Tre {
    /// Build the element for one descriptor.
    ///
    /// `bei` suppresses the completion interrupt of the final element.
    pub fn fill(addr: DmaAddr, len: u32, opcode: Opcode, last: bool, bei: bool) -> Self {
        let (len_opcode, tre_type) = if opcode.is_none() {
            (len as u16, TreType::Xfer)
        } else {
            (opcode.raw(), TreType::ImmdCmd)
        };

        let flags = if last {
            let mut flags = TreFlags::IEOT;
            flags.set(TreFlags::BEI, bei);
            flags
        } else {
            TreFlags::CHAIN
        };

        Self {
            addr,
            len_opcode,
            flags,
            tre_type,
        }
    }

    /// Build the element for a committed descriptor
    #[inline]
    pub fn from_descriptor(desc: &Descriptor, bei: bool) -> Self {
        Self::fill(desc.addr, desc.len, desc.opcode, desc.last, bei)
    }

    /// Little-endian wire form
    pub fn encode(&self) -> [u8; TRE_SIZE] {
        let flags = self.flags.bits() | (u32::from(self.tre_type as u8) << TYPE_SHIFT);

        let mut out = [0u8; TRE_SIZE];
        out[0..8].copy_from_slice(&self.addr.raw().to_le_bytes());
        out[8..10].copy_from_slice(&self.len_opcode.to_le_bytes());
        out[12..16].copy_from_slice(&flags.to_le_bytes());
        out
    }

    /// Parse the wire form; `None` for an unknown element type
    pub fn decode(bytes: &[u8; TRE_SIZE]) -> Option<Self> {
        let mut addr = [0u8; 8];
        addr.copy_from_slice(&bytes[0..8]);
        let len_opcode = u16::from_le_bytes([bytes[8], bytes[9]]);
        let raw = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);

        Some(Self {
            addr: DmaAddr::new(u64::from_le_bytes(addr)),
            len_opcode,
            flags: TreFlags::from_bits_truncate(raw & !TYPE_MASK),
            tre_type: TreType::from_raw((raw & TYPE_MASK) >> TYPE_SHIFT)?,
        })
    }
}
