//! # Command Field Validation
//!
//! Checks that memory regions and register offsets fit the command fields
//! that will carry them. Run once at initialization, before any command is
//! built; an encoder silently truncates values that do not fit.

use ipa_core::{CmdLayout, Error, Result};

use crate::encoder::CmdEncoder;
use crate::opcode::TableKind;
use crate::payload::current::{LOCAL_BITS, OFFSET_HIGH_BITS, SIZE_BITS};
use crate::payload::mask;
use crate::region::MemRegion;

/// Width of the register offset field common to every layout
const REGISTER_OFFSET_BITS: u32 = 16;

impl CmdEncoder {
    /// Check a filter or route table region.
    ///
    /// The region plus the memory offset must fit a local address field
    /// and the region must lie inside IPA-local memory. `hashed` selects
    /// the hashed table fields.
    pub fn table_valid(&self, region: &MemRegion, kind: TableKind, hashed: bool) -> Result<()> {
        let offset_max = mask(LOCAL_BITS) as u32;
        let hashed = if hashed { "hashed " } else { "" };

        if region.offset > offset_max || self.mem_offset() > offset_max - region.offset {
            log::error!(
                "{} {}table region offset too large (0x{:04x} + 0x{:04x} > 0x{:04x})",
                kind,
                hashed,
                self.mem_offset(),
                region.offset,
                offset_max
            );
            return Err(Error::RegionOutOfRange);
        }

        if region.offset > self.mem_size() || region.size > self.mem_size() - region.offset {
            log::error!(
                "{} {}table region out of range (0x{:04x} + 0x{:04x} > 0x{:04x})",
                kind,
                hashed,
                region.offset,
                region.size,
                self.mem_size()
            );
            return Err(Error::RegionOutOfRange);
        }

        Ok(())
    }

    /// Check the header table region.
    ///
    /// Modem and AP header tables are initialized as one table starting
    /// at the modem region; their combined size must fit the size field.
    pub fn header_valid(&self, modem: &MemRegion, ap: Option<&MemRegion>) -> Result<()> {
        let offset_max = mask(LOCAL_BITS) as u32;
        if modem.offset > offset_max || self.mem_offset() > offset_max - modem.offset {
            log::error!(
                "header table region offset too large (0x{:04x} + 0x{:04x} > 0x{:04x})",
                self.mem_offset(),
                modem.offset,
                offset_max
            );
            return Err(Error::RegionOutOfRange);
        }

        let size = modem.size + ap.map_or(0, |ap| ap.size);
        let size_max = mask(SIZE_BITS) as u32;
        if size > size_max {
            log::error!(
                "header table size too large (0x{:04x} > 0x{:04x})",
                size,
                size_max
            );
            return Err(Error::RegionOutOfRange);
        }

        if modem.offset > self.mem_size() || size > self.mem_size() - modem.offset {
            log::error!(
                "header table region out of range (0x{:04x} + 0x{:04x} > 0x{:04x})",
                modem.offset,
                size,
                self.mem_size()
            );
            return Err(Error::RegionOutOfRange);
        }

        Ok(())
    }

    /// Largest register offset a register write can reach
    pub fn register_write_offset_max(&self) -> u32 {
        let bits = match self.layout() {
            CmdLayout::Current if self.version().opcode_carries_clear_option() => {
                REGISTER_OFFSET_BITS + OFFSET_HIGH_BITS
            }
            _ => REGISTER_OFFSET_BITS,
        };
        mask(bits) as u32
    }

    /// Check that register `name` at `offset` is reachable by a register
    /// write, memory offset included
    pub fn register_write_offset_valid(&self, name: &str, offset: u32) -> Result<()> {
        let offset_max = self.register_write_offset_max();
        if offset > offset_max || self.mem_offset() > offset_max - offset {
            log::error!(
                "{} offset too large (0x{:04x} + 0x{:04x} > 0x{:04x})",
                name,
                self.mem_offset(),
                offset,
                offset_max
            );
            return Err(Error::RegionOutOfRange);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ipa_core::IpaVersion;

    use super::*;
    use crate::region::MemId;

    fn region(id: MemId, offset: u32, size: u32) -> MemRegion {
        MemRegion {
            id,
            offset,
            size,
            canary_count: 0,
        }
    }

    #[test]
    fn test_table_region_checks() {
        let encoder = CmdEncoder::new(IpaVersion::V4_2, 0x4000, 0x2000);
        let filter = region(MemId::V4Filter, 0x288, 0x58);
        assert!(encoder.table_valid(&filter, TableKind::V4Filter, false).is_ok());

        let outside = region(MemId::V6Route, 0x1fc0, 0x80);
        assert_eq!(
            encoder.table_valid(&outside, TableKind::V6Route, true),
            Err(Error::RegionOutOfRange)
        );

        let far = CmdEncoder::new(IpaVersion::V4_2, 0xff00, 0x2000);
        assert_eq!(
            far.table_valid(&filter, TableKind::V4Filter, false),
            Err(Error::RegionOutOfRange)
        );
    }

    #[test]
    fn test_header_size_includes_ap_region() {
        let encoder = CmdEncoder::new(IpaVersion::V2_6L, 0x4000, 0x2000);
        let modem = region(MemId::ModemHeader, 0x3c8, 0x140);
        assert!(encoder.header_valid(&modem, None).is_ok());

        let ap = region(MemId::ApHeader, 0x508, 0x0f00);
        assert_eq!(
            encoder.header_valid(&modem, Some(&ap)),
            Err(Error::RegionOutOfRange)
        );
    }

    #[test]
    fn test_register_offset_width_by_version() {
        let v3 = CmdEncoder::new(IpaVersion::V3_5_1, 0, 0x2000);
        let v4 = CmdEncoder::new(IpaVersion::V4_2, 0, 0x2000);
        let v2 = CmdEncoder::new(IpaVersion::V2_6L, 0, 0x2000);

        assert_eq!(v3.register_write_offset_max(), 0xffff);
        assert_eq!(v4.register_write_offset_max(), 0xf_ffff);
        assert_eq!(v2.register_write_offset_max(), 0xffff);

        assert!(v4.register_write_offset_valid("status", 0x1_0000).is_ok());
        assert_eq!(
            v3.register_write_offset_valid("status", 0x1_0000),
            Err(Error::RegionOutOfRange)
        );
    }
}
