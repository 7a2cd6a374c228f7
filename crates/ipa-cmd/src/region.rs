//! # IPA-Local Memory Regions
//!
//! Layout of the IPA-resident memory that table, header and shared memory
//! commands address. Offsets are relative to the region the modem shares
//! with the AP; commands add the driver-wide memory offset on top.

use core::fmt;

/// Region identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemId {
    /// Microcontroller shared area
    UcShared,
    /// Microcontroller event log
    UcInfo,
    /// IPv4 filter table
    V4Filter,
    /// IPv6 filter table
    V6Filter,
    /// IPv4 routing table
    V4Route,
    /// IPv6 routing table
    V6Route,
    /// Header table owned by the modem
    ModemHeader,
    /// Header table owned by the AP
    ApHeader,
    /// Decompression scratch
    Zip,
    /// Modem private area
    Modem,
}

impl fmt::Display for MemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::UcShared => "uc_shared",
            Self::UcInfo => "uc_info",
            Self::V4Filter => "v4_filter",
            Self::V6Filter => "v6_filter",
            Self::V4Route => "v4_route",
            Self::V6Route => "v6_route",
            Self::ModemHeader => "modem_header",
            Self::ApHeader => "ap_header",
            Self::Zip => "zip",
            Self::Modem => "modem",
        };
        f.write_str(name)
    }
}

/// One region of IPA-local memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemRegion {
    /// Region
    pub id: MemId,
    /// Byte offset
    pub offset: u32,
    /// Byte size
    pub size: u32,
    /// 32-bit canary words written just below `offset`
    pub canary_count: u16,
}

impl MemRegion {
    /// First byte past the region
    #[inline]
    pub fn end(&self) -> u32 {
        self.offset + self.size
    }

    /// Find a region by id
    pub fn find(regions: &[MemRegion], id: MemId) -> Option<&MemRegion> {
        regions.iter().find(|region| region.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_region() {
        let regions = [
            MemRegion {
                id: MemId::V4Filter,
                offset: 0x288,
                size: 0x58,
                canary_count: 2,
            },
            MemRegion {
                id: MemId::ModemHeader,
                offset: 0x3c8,
                size: 0x140,
                canary_count: 2,
            },
        ];

        let header = MemRegion::find(&regions, MemId::ModemHeader).unwrap();
        assert_eq!(header.end(), 0x508);
        assert!(MemRegion::find(&regions, MemId::ApHeader).is_none());
    }
}
