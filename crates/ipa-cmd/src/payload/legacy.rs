//! # IPA v2.x Layouts
//!
//! Command payloads for BAM-based hardware. Addresses of host memory are
//! 32 bits wide; IPA-local offsets are 16 bits.

use super::{decode_bits, encode_bits, le16, le32, le64};

const ADDR_LO: u32 = 0;
const ADDR_BITS: u32 = 32;
const SIZE_LO: u32 = 32;
const SIZE_BITS: u32 = 12;
const LOCAL_LO: u32 = 44;
const LOCAL_BITS: u32 = 16;

/// Skip-clear bit of the register write flags
const REGISTER_WRITE_SKIP_CLEAR: u16 = 1 << 15;

/// Direction bit of the DMA shared memory flags; set to read from the IPA
const DMA_SHARED_MEM_READ: u16 = 1 << 0;

/// Tag status cookie
pub const TAG_COOKIE: u64 = 0x5783_1603;

/// Width of the tag status tag field
pub const TAG_BITS: u32 = 32;

fn pack_addr_size_local(addr: u32, size: u16, local: u16) -> [u8; 8] {
    let raw = encode_bits(u64::from(addr), ADDR_LO, ADDR_BITS)
        | encode_bits(u64::from(size), SIZE_LO, SIZE_BITS)
        | encode_bits(u64::from(local), LOCAL_LO, LOCAL_BITS);
    raw.to_le_bytes()
}

fn unpack_addr_size_local(bytes: &[u8]) -> (u32, u16, u16) {
    let raw = le64(bytes, 0);
    (
        decode_bits(raw, ADDR_LO, ADDR_BITS) as u32,
        decode_bits(raw, SIZE_LO, SIZE_BITS) as u16,
        decode_bits(raw, LOCAL_LO, LOCAL_BITS) as u16,
    )
}

/// IPv4 filter or route table init
///
/// `le64 = rules_addr[31:0] | size[43:32] | local_addr[59:44]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableInitV4 {
    /// Host address of the rules to copy
    pub rules_addr: u32,
    /// Table size in bytes, 12 bits
    pub size: u16,
    /// Destination offset in IPA-local memory
    pub local_addr: u16,
}

impl TableInitV4 {
    /// Encoded size
    pub const SIZE: usize = 8;

    /// Wire form
    pub fn encode(&self) -> [u8; Self::SIZE] {
        pack_addr_size_local(self.rules_addr, self.size, self.local_addr)
    }

    /// Parse the wire form
    pub fn decode(bytes: &[u8]) -> Self {
        let (rules_addr, size, local_addr) = unpack_addr_size_local(bytes);
        Self {
            rules_addr,
            size,
            local_addr,
        }
    }
}

/// IPv6 filter or route table init
///
/// `le32 rules_addr, le16 size, le16 local_addr`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableInitV6 {
    /// Host address of the rules to copy
    pub rules_addr: u32,
    /// Table size in bytes
    pub size: u16,
    /// Destination offset in IPA-local memory
    pub local_addr: u16,
}

impl TableInitV6 {
    /// Encoded size
    pub const SIZE: usize = 8;

    /// Wire form
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&self.rules_addr.to_le_bytes());
        out[4..6].copy_from_slice(&self.size.to_le_bytes());
        out[6..8].copy_from_slice(&self.local_addr.to_le_bytes());
        out
    }

    /// Parse the wire form
    pub fn decode(bytes: &[u8]) -> Self {
        Self {
            rules_addr: le32(bytes, 0),
            size: le16(bytes, 4),
            local_addr: le16(bytes, 6),
        }
    }
}

/// Header table init in IPA-local memory
///
/// `le64 = src_addr[31:0] | size[43:32] | dst_addr[59:44]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HdrInitLocal {
    /// Host address of the initial table contents
    pub src_addr: u32,
    /// Table size in bytes, 12 bits
    pub size: u16,
    /// Table offset in IPA-local memory
    pub dst_addr: u16,
}

impl HdrInitLocal {
    /// Encoded size
    pub const SIZE: usize = 8;

    /// Wire form
    pub fn encode(&self) -> [u8; Self::SIZE] {
        pack_addr_size_local(self.src_addr, self.size, self.dst_addr)
    }

    /// Parse the wire form
    pub fn decode(bytes: &[u8]) -> Self {
        let (src_addr, size, dst_addr) = unpack_addr_size_local(bytes);
        Self {
            src_addr,
            size,
            dst_addr,
        }
    }
}

/// Register write
///
/// `le16 flags (skip_clear 15), le16 offset, le32 value, le32 mask`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegisterWrite {
    /// Skip the pipeline clear before writing
    pub skip_clear: bool,
    /// Register offset
    pub offset: u16,
    /// Value to write
    pub value: u32,
    /// Bits of `value` to apply
    pub mask: u32,
}

impl RegisterWrite {
    /// Encoded size
    pub const SIZE: usize = 12;

    /// Wire form
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let flags = if self.skip_clear {
            REGISTER_WRITE_SKIP_CLEAR
        } else {
            0
        };

        let mut out = [0u8; Self::SIZE];
        out[0..2].copy_from_slice(&flags.to_le_bytes());
        out[2..4].copy_from_slice(&self.offset.to_le_bytes());
        out[4..8].copy_from_slice(&self.value.to_le_bytes());
        out[8..12].copy_from_slice(&self.mask.to_le_bytes());
        out
    }

    /// Parse the wire form
    pub fn decode(bytes: &[u8]) -> Self {
        Self {
            skip_clear: le16(bytes, 0) & REGISTER_WRITE_SKIP_CLEAR != 0,
            offset: le16(bytes, 2),
            value: le32(bytes, 4),
            mask: le32(bytes, 8),
        }
    }
}

/// Copy between host memory and IPA-local memory
///
/// `le16 reserved, le16 size, le32 system_addr, le16 local_addr,
/// le16 flags (direction 0), le32 padding`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DmaSharedMem {
    /// Bytes to copy
    pub size: u16,
    /// Host address
    pub system_addr: u32,
    /// Offset in IPA-local memory
    pub local_addr: u16,
    /// Copy from the IPA into host memory
    pub read: bool,
}

impl DmaSharedMem {
    /// Encoded size
    pub const SIZE: usize = 16;

    /// Wire form
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let flags = if self.read { DMA_SHARED_MEM_READ } else { 0 };

        let mut out = [0u8; Self::SIZE];
        out[2..4].copy_from_slice(&self.size.to_le_bytes());
        out[4..8].copy_from_slice(&self.system_addr.to_le_bytes());
        out[8..10].copy_from_slice(&self.local_addr.to_le_bytes());
        out[10..12].copy_from_slice(&flags.to_le_bytes());
        out
    }

    /// Parse the wire form
    pub fn decode(bytes: &[u8]) -> Self {
        Self {
            size: le16(bytes, 2),
            system_addr: le32(bytes, 4),
            local_addr: le16(bytes, 8),
            read: le16(bytes, 10) & DMA_SHARED_MEM_READ != 0,
        }
    }
}

/// Packet tag status
///
/// `le64 tag[31:0]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TagStatus {
    /// Tag reported in the status of the next packet
    pub tag: u64,
}

impl TagStatus {
    /// Encoded size
    pub const SIZE: usize = 8;

    /// Wire form
    pub fn encode(&self) -> [u8; Self::SIZE] {
        encode_bits(self.tag, 0, TAG_BITS).to_le_bytes()
    }

    /// Parse the wire form
    pub fn decode(bytes: &[u8]) -> Self {
        Self {
            tag: decode_bits(le64(bytes, 0), 0, TAG_BITS),
        }
    }
}
