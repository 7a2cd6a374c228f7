//! # IPA Hardware Versions
//!
//! The hardware version selects both the transport backend and the
//! immediate command layout.

use core::fmt;

/// IPA hardware revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum IpaVersion {
    /// IPA v2.0
    V2_0,
    /// IPA v2.5
    V2_5,
    /// IPA v2.6L (msm8953 and friends)
    V2_6L,
    /// IPA v3.0
    V3_0,
    /// IPA v3.1
    V3_1,
    /// IPA v3.5
    V3_5,
    /// IPA v3.5.1
    V3_5_1,
    /// IPA v4.0
    V4_0,
    /// IPA v4.1
    V4_1,
    /// IPA v4.2
    V4_2,
    /// IPA v4.5
    V4_5,
    /// IPA v4.9
    V4_9,
    /// IPA v4.11
    V4_11,
}

/// Transport generation backing a hardware revision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Legacy BAM DMA engine
    Bam,
    /// Generic software interface rings
    Gsi,
}

/// Immediate command payload generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdLayout {
    /// Layouts understood by IPA v2.x firmware
    Legacy,
    /// Layouts understood by IPA v3.0 and later
    Current,
}

impl IpaVersion {
    /// Whether this revision predates the GSI
    #[inline]
    pub const fn is_legacy(self) -> bool {
        matches!(self, Self::V2_0 | Self::V2_5 | Self::V2_6L)
    }

    /// Transport generation used by this revision
    pub const fn transport_kind(self) -> TransportKind {
        if self.is_legacy() {
            TransportKind::Bam
        } else {
            TransportKind::Gsi
        }
    }

    /// Command payload generation used by this revision
    pub const fn cmd_layout(self) -> CmdLayout {
        if self.is_legacy() {
            CmdLayout::Legacy
        } else {
            CmdLayout::Current
        }
    }

    /// Whether pipeline clear options are carried in the opcode
    #[inline]
    pub fn opcode_carries_clear_option(self) -> bool {
        self >= Self::V4_0
    }
}

impl fmt::Display for IpaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::V2_0 => "2.0",
            Self::V2_5 => "2.5",
            Self::V2_6L => "2.6L",
            Self::V3_0 => "3.0",
            Self::V3_1 => "3.1",
            Self::V3_5 => "3.5",
            Self::V3_5_1 => "3.5.1",
            Self::V4_0 => "4.0",
            Self::V4_1 => "4.1",
            Self::V4_2 => "4.2",
            Self::V4_5 => "4.5",
            Self::V4_9 => "4.9",
            Self::V4_11 => "4.11",
        };
        write!(f, "IPA v{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_selection() {
        assert_eq!(IpaVersion::V2_6L.transport_kind(), TransportKind::Bam);
        assert_eq!(IpaVersion::V3_5_1.transport_kind(), TransportKind::Gsi);
        assert_eq!(IpaVersion::V4_2.cmd_layout(), CmdLayout::Current);
        assert_eq!(IpaVersion::V2_0.cmd_layout(), CmdLayout::Legacy);
    }

    #[test]
    fn test_clear_option_placement() {
        assert!(!IpaVersion::V3_5_1.opcode_carries_clear_option());
        assert!(IpaVersion::V4_0.opcode_carries_clear_option());
        assert!(IpaVersion::V4_11.opcode_carries_clear_option());
    }
}
