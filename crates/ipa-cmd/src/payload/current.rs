//! # IPA v3.0+ Layouts
//!
//! Command payloads for GSI-based hardware. Host addresses are 64 bits.

use super::{decode_bits, encode_bits, le16, le32, le64};

// Table init flags
const HASH_SIZE_LO: u32 = 0;
const HASH_LOCAL_LO: u32 = 12;
const NHASH_SIZE_LO: u32 = 28;
const NHASH_LOCAL_LO: u32 = 40;

/// Width of a table or header size field
pub const SIZE_BITS: u32 = 12;

/// Width of a table or header local address field
pub const LOCAL_BITS: u32 = 16;

// Header init flags
const HDR_SIZE_LO: u32 = 0;
const HDR_LOCAL_LO: u32 = 12;

// Register write flags
const OFFSET_HIGH_LO: u32 = 11;

/// Width of the high register offset bits carried in the flags
pub const OFFSET_HIGH_BITS: u32 = 4;

const REGISTER_WRITE_SKIP_CLEAR: u16 = 1 << 15;
const CLEAR_OPTIONS_BITS: u32 = 2;

// DMA shared memory
const CLEAR_AFTER_READ: u16 = 1 << 15;
const DMA_SHARED_MEM_READ: u16 = 1 << 0;

/// Tag status cookie
pub const TAG_COOKIE: u64 = 0xcba9_8765_4321;

const TAG_LO: u32 = 16;

/// Width of the tag status tag field
pub const TAG_BITS: u32 = 48;

/// Filter or route table init
///
/// ```text
///   le64 hash_addr | le64 flags | le64 nhash_addr
///
///   flags: hash_size 11:0, hash_local 27:12,
///          nhash_size 39:28, nhash_local 55:40
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableInit {
    /// Host address of the hashed rules
    pub hash_addr: u64,
    /// Hashed table size in bytes
    pub hash_size: u16,
    /// Hashed table offset in IPA-local memory
    pub hash_local: u16,
    /// Non-hashed table size in bytes
    pub nhash_size: u16,
    /// Non-hashed table offset in IPA-local memory
    pub nhash_local: u16,
    /// Host address of the non-hashed rules
    pub nhash_addr: u64,
}

impl TableInit {
    /// Encoded size
    pub const SIZE: usize = 24;

    /// Wire form
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let flags = encode_bits(u64::from(self.hash_size), HASH_SIZE_LO, SIZE_BITS)
            | encode_bits(u64::from(self.hash_local), HASH_LOCAL_LO, LOCAL_BITS)
            | encode_bits(u64::from(self.nhash_size), NHASH_SIZE_LO, SIZE_BITS)
            | encode_bits(u64::from(self.nhash_local), NHASH_LOCAL_LO, LOCAL_BITS);

        let mut out = [0u8; Self::SIZE];
        out[0..8].copy_from_slice(&self.hash_addr.to_le_bytes());
        out[8..16].copy_from_slice(&flags.to_le_bytes());
        out[16..24].copy_from_slice(&self.nhash_addr.to_le_bytes());
        out
    }

    /// Parse the wire form
    pub fn decode(bytes: &[u8]) -> Self {
        let flags = le64(bytes, 8);
        Self {
            hash_addr: le64(bytes, 0),
            hash_size: decode_bits(flags, HASH_SIZE_LO, SIZE_BITS) as u16,
            hash_local: decode_bits(flags, HASH_LOCAL_LO, LOCAL_BITS) as u16,
            nhash_size: decode_bits(flags, NHASH_SIZE_LO, SIZE_BITS) as u16,
            nhash_local: decode_bits(flags, NHASH_LOCAL_LO, LOCAL_BITS) as u16,
            nhash_addr: le64(bytes, 16),
        }
    }
}

/// Header table init in IPA-local memory
///
/// `le64 table_addr, le32 flags (size 11:0, local 27:12), le32 reserved`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HdrInitLocal {
    /// Host address of the initial table contents
    pub table_addr: u64,
    /// Table size in bytes
    pub size: u16,
    /// Table offset in IPA-local memory
    pub local_addr: u16,
}

impl HdrInitLocal {
    /// Encoded size
    pub const SIZE: usize = 16;

    /// Wire form
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let flags = encode_bits(u64::from(self.size), HDR_SIZE_LO, SIZE_BITS)
            | encode_bits(u64::from(self.local_addr), HDR_LOCAL_LO, LOCAL_BITS);

        let mut out = [0u8; Self::SIZE];
        out[0..8].copy_from_slice(&self.table_addr.to_le_bytes());
        out[8..12].copy_from_slice(&(flags as u32).to_le_bytes());
        out
    }

    /// Parse the wire form
    pub fn decode(bytes: &[u8]) -> Self {
        let flags = u64::from(le32(bytes, 8));
        Self {
            table_addr: le64(bytes, 0),
            size: decode_bits(flags, HDR_SIZE_LO, SIZE_BITS) as u16,
            local_addr: decode_bits(flags, HDR_LOCAL_LO, LOCAL_BITS) as u16,
        }
    }
}

/// Register write
///
/// ```text
///   le16 flags | le16 offset | le32 value | le32 mask | le32 clear_options
///
///   flags: offset_high 14:11, skip_clear 15 (IPA v4.0+)
///   clear_options: pipeline clear 1:0 (IPA v3.x)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegisterWrite {
    /// Register offset bits 19:16
    pub offset_high: u8,
    /// Skip the pipeline clear before writing
    pub skip_clear: bool,
    /// Register offset bits 15:0
    pub offset: u16,
    /// Value to write
    pub value: u32,
    /// Bits of `value` to apply
    pub mask: u32,
    /// Pipeline clear option
    pub clear_options: u8,
}

impl RegisterWrite {
    /// Encoded size
    pub const SIZE: usize = 16;

    /// Wire form
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut flags =
            encode_bits(u64::from(self.offset_high), OFFSET_HIGH_LO, OFFSET_HIGH_BITS) as u16;
        if self.skip_clear {
            flags |= REGISTER_WRITE_SKIP_CLEAR;
        }
        let options = encode_bits(u64::from(self.clear_options), 0, CLEAR_OPTIONS_BITS) as u32;

        let mut out = [0u8; Self::SIZE];
        out[0..2].copy_from_slice(&flags.to_le_bytes());
        out[2..4].copy_from_slice(&self.offset.to_le_bytes());
        out[4..8].copy_from_slice(&self.value.to_le_bytes());
        out[8..12].copy_from_slice(&self.mask.to_le_bytes());
        out[12..16].copy_from_slice(&options.to_le_bytes());
        out
    }

    /// Parse the wire form
    pub fn decode(bytes: &[u8]) -> Self {
        let flags = le16(bytes, 0);
        Self {
            offset_high: decode_bits(u64::from(flags), OFFSET_HIGH_LO, OFFSET_HIGH_BITS) as u8,
            skip_clear: flags & REGISTER_WRITE_SKIP_CLEAR != 0,
            offset: le16(bytes, 2),
            value: le32(bytes, 4),
            mask: le32(bytes, 8),
            clear_options: decode_bits(u64::from(le32(bytes, 12)), 0, CLEAR_OPTIONS_BITS) as u8,
        }
    }

    /// Full register offset
    #[inline]
    pub fn full_offset(&self) -> u32 {
        (u32::from(self.offset_high) << 16) | u32::from(self.offset)
    }
}

/// Copy between host memory and IPA-local memory
///
/// `le16 clear_after_read, le16 size, le16 local_addr, le16 flags
/// (direction 0), le64 system_addr`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DmaSharedMem {
    /// Zero the local region after reading it (IPA v4.0+)
    pub clear_after_read: bool,
    /// Bytes to copy
    pub size: u16,
    /// Offset in IPA-local memory
    pub local_addr: u16,
    /// Copy from the IPA into host memory
    pub read: bool,
    /// Host address
    pub system_addr: u64,
}

impl DmaSharedMem {
    /// Encoded size
    pub const SIZE: usize = 16;

    /// Wire form
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let clear = if self.clear_after_read {
            CLEAR_AFTER_READ
        } else {
            0
        };
        let flags = if self.read { DMA_SHARED_MEM_READ } else { 0 };

        let mut out = [0u8; Self::SIZE];
        out[0..2].copy_from_slice(&clear.to_le_bytes());
        out[2..4].copy_from_slice(&self.size.to_le_bytes());
        out[4..6].copy_from_slice(&self.local_addr.to_le_bytes());
        out[6..8].copy_from_slice(&flags.to_le_bytes());
        out[8..16].copy_from_slice(&self.system_addr.to_le_bytes());
        out
    }

    /// Parse the wire form
    pub fn decode(bytes: &[u8]) -> Self {
        Self {
            clear_after_read: le16(bytes, 0) & CLEAR_AFTER_READ != 0,
            size: le16(bytes, 2),
            local_addr: le16(bytes, 4),
            read: le16(bytes, 6) & DMA_SHARED_MEM_READ != 0,
            system_addr: le64(bytes, 8),
        }
    }
}

/// Packet tag status
///
/// `le64 tag[63:16]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TagStatus {
    /// Tag reported in the status of the next packet, 48 bits
    pub tag: u64,
}

impl TagStatus {
    /// Encoded size
    pub const SIZE: usize = 8;

    /// Wire form
    pub fn encode(&self) -> [u8; Self::SIZE] {
        encode_bits(self.tag, TAG_LO, TAG_BITS).to_le_bytes()
    }

    /// Parse the wire form
    pub fn decode(bytes: &[u8]) -> Self {
        Self {
            tag: decode_bits(le64(bytes, 0), TAG_LO, TAG_BITS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_init_flags() {
        let cmd = TableInit {
            hash_addr: 0x1_0000_2000,
            hash_size: 0x40,
            hash_local: 0x0388,
            nhash_size: 0x58,
            nhash_local: 0x02e8,
            nhash_addr: 0x1_0000_3000,
        };
        let bytes = cmd.encode();
        let flags = u64::from_le_bytes(bytes[8..16].try_into().unwrap());

        assert_eq!(flags & 0xfff, 0x40);
        assert_eq!((flags >> 12) & 0xffff, 0x0388);
        assert_eq!((flags >> 28) & 0xfff, 0x58);
        assert_eq!((flags >> 40) & 0xffff, 0x02e8);
        assert_eq!(flags >> 56, 0);
        assert_eq!(TableInit::decode(&bytes), cmd);
    }

    #[test]
    fn test_header_init_layout() {
        let cmd = HdrInitLocal {
            table_addr: 0xffff_0000_1000,
            size: 0x140,
            local_addr: 0x3c8,
        };
        let bytes = cmd.encode();
        assert_eq!(le32(&bytes, 8), 0x140 | (0x3c8 << 12));
        assert_eq!(&bytes[12..16], &[0; 4]);
        assert_eq!(HdrInitLocal::decode(&bytes), cmd);
    }

    #[test]
    fn test_register_write_high_offset() {
        let cmd = RegisterWrite {
            offset_high: 0x3,
            offset: 0x0148,
            value: 1,
            mask: !0,
            ..Default::default()
        };
        let bytes = cmd.encode();
        assert_eq!(le16(&bytes, 0), 0x3 << 11);
        assert_eq!(RegisterWrite::decode(&bytes).full_offset(), 0x3_0148);
    }

    #[test]
    fn test_register_write_clear_options() {
        let cmd = RegisterWrite {
            clear_options: 2,
            ..Default::default()
        };
        let bytes = cmd.encode();
        assert_eq!(le16(&bytes, 0), 0);
        assert_eq!(le32(&bytes, 12), 2);
    }

    #[test]
    fn test_dma_shared_mem_layout() {
        let cmd = DmaSharedMem {
            clear_after_read: false,
            size: 0x80,
            local_addr: 0x4000,
            read: true,
            system_addr: 0x1_2345_6780,
        };
        let bytes = cmd.encode();
        assert_eq!(le16(&bytes, 2), 0x80);
        assert_eq!(le16(&bytes, 4), 0x4000);
        assert_eq!(le16(&bytes, 6), 1);
        assert_eq!(le64(&bytes, 8), 0x1_2345_6780);
        assert_eq!(DmaSharedMem::decode(&bytes), cmd);
    }

    #[test]
    fn test_tag_status_shifted() {
        let bytes = TagStatus { tag: TAG_COOKIE }.encode();
        assert_eq!(u64::from_le_bytes(bytes), 0xcba9_8765_4321 << 16);
        assert_eq!(TagStatus::decode(&bytes).tag, TAG_COOKIE);
    }
}
