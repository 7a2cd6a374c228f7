//! # Command Payloads
//!
//! Wire layouts of every immediate command, one struct per layout.
//!
//! IPA v2.x reads the [`legacy`] layouts; IPA v3.0 and later read the
//! [`current`] ones. [`IpPacketInit`] is shared by both. All multi-byte
//! fields are little-endian. Each struct packs with `encode` and unpacks
//! with `decode`; `decode` panics on a slice shorter than the layout.
//!
//! Every payload is carved from one command pool slot, so the largest
//! layout bounds the slot size.

use static_assertions::{const_assert, const_assert_eq};

use ipa_trans::CMD_PAYLOAD_SIZE;

pub mod current;
pub mod legacy;

/// Size of the largest command layout; the zero-filled transfer command
/// sends this many bytes
pub const PAYLOAD_UNION_SIZE: usize = 24;

const_assert_eq!(PAYLOAD_UNION_SIZE, current::TableInit::SIZE);
const_assert!(PAYLOAD_UNION_SIZE <= CMD_PAYLOAD_SIZE);
const_assert!(legacy::RegisterWrite::SIZE <= PAYLOAD_UNION_SIZE);
const_assert!(legacy::DmaSharedMem::SIZE <= PAYLOAD_UNION_SIZE);
const_assert!(current::RegisterWrite::SIZE <= PAYLOAD_UNION_SIZE);
const_assert!(current::DmaSharedMem::SIZE <= PAYLOAD_UNION_SIZE);

// =============================================================================
// FIELD HELPERS
// =============================================================================

#[inline]
pub(crate) const fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1 << width) - 1
    }
}

/// Place the low `width` bits of `value` at bit `lo`
#[inline]
pub(crate) const fn encode_bits(value: u64, lo: u32, width: u32) -> u64 {
    (value & mask(width)) << lo
}

/// Extract `width` bits starting at bit `lo`
#[inline]
pub(crate) const fn decode_bits(raw: u64, lo: u32, width: u32) -> u64 {
    (raw >> lo) & mask(width)
}

#[inline]
pub(crate) fn le16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

#[inline]
pub(crate) fn le32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

#[inline]
pub(crate) fn le64(bytes: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(raw)
}

// =============================================================================
// SHARED LAYOUTS
// =============================================================================

/// Width of the destination endpoint field
pub const PACKET_INIT_ENDPOINT_BITS: u32 = 5;

/// Packet init; identical on every version
///
/// ```text
///   byte 0            1                           8
///        ┌────────────┬───────────────────────────┐
///        │ dest[4:0]  │ reserved                  │
///        └────────────┴───────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IpPacketInit {
    /// Endpoint that receives the next packet unprocessed
    pub dest_endpoint: u8,
}

impl IpPacketInit {
    /// Encoded size
    pub const SIZE: usize = 8;

    /// Wire form
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0] = encode_bits(u64::from(self.dest_endpoint), 0, PACKET_INIT_ENDPOINT_BITS) as u8;
        out
    }

    /// Parse the wire form
    pub fn decode(bytes: &[u8]) -> Self {
        Self {
            dest_endpoint: decode_bits(u64::from(bytes[0]), 0, PACKET_INIT_ENDPOINT_BITS) as u8,
        }
    }
}
