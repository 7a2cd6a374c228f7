//! # Command Opcodes
//!
//! Immediate command opcodes and the pipeline clear options some of them
//! carry.

use core::fmt;

use ipa_core::Opcode;

/// Immediate command kinds this driver issues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CmdOpcode {
    /// Plain data transfer on the command channel
    None = 0,
    /// Initialize the IPv4 filter table
    IpV4FilterInit = 3,
    /// Initialize the IPv6 filter table
    IpV6FilterInit = 4,
    /// Initialize the IPv4 routing table
    IpV4RoutingInit = 7,
    /// Initialize the IPv6 routing table
    IpV6RoutingInit = 8,
    /// Initialize the header table in IPA-local memory
    HdrInitLocal = 9,
    /// Write an IPA register
    RegisterWrite = 12,
    /// Skip packet processing for the next transfer
    IpPacketInit = 16,
    /// Copy between host and IPA-local memory
    DmaSharedMem = 19,
    /// Request a tagged status for the next packet
    IpPacketTagStatus = 20,
}

impl CmdOpcode {
    /// Raw value
    #[inline]
    pub const fn raw(self) -> u16 {
        self as u16
    }

    /// Parse a raw opcode, ignoring option bits above bit 7
    pub fn from_raw(raw: u16) -> Option<Self> {
        let opcode = match raw & 0xff {
            0 => Self::None,
            3 => Self::IpV4FilterInit,
            4 => Self::IpV6FilterInit,
            7 => Self::IpV4RoutingInit,
            8 => Self::IpV6RoutingInit,
            9 => Self::HdrInitLocal,
            12 => Self::RegisterWrite,
            16 => Self::IpPacketInit,
            19 => Self::DmaSharedMem,
            20 => Self::IpPacketTagStatus,
            _ => return None,
        };
        Some(opcode)
    }
}

impl From<CmdOpcode> for Opcode {
    fn from(opcode: CmdOpcode) -> Self {
        Opcode::new(opcode.raw())
    }
}

impl fmt::Display for CmdOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::IpV4FilterInit => "ip_v4_filter_init",
            Self::IpV6FilterInit => "ip_v6_filter_init",
            Self::IpV4RoutingInit => "ip_v4_routing_init",
            Self::IpV6RoutingInit => "ip_v6_routing_init",
            Self::HdrInitLocal => "hdr_init_local",
            Self::RegisterWrite => "register_write",
            Self::IpPacketInit => "ip_packet_init",
            Self::DmaSharedMem => "dma_shared_mem",
            Self::IpPacketTagStatus => "ip_packet_tag_status",
        };
        f.write_str(name)
    }
}

/// Which pipeline stages must drain before a command executes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelineClear {
    /// Wait for the header processing stage
    Hps = 0,
    /// Wait for the source group
    SrcGrp = 1,
    /// Wait for the whole pipeline
    Full = 2,
}

impl PipelineClear {
    /// Option for a register write
    #[inline]
    pub const fn for_write(clear_full: bool) -> Self {
        if clear_full {
            Self::Full
        } else {
            Self::Hps
        }
    }

    /// Raw two-bit value
    #[inline]
    pub const fn raw(self) -> u8 {
        self as u8
    }
}

/// Opcode bit suppressing the pipeline clear (IPA v4.0+)
pub const OPCODE_SKIP_CLEAR: u16 = 1 << 8;

/// Shift of the pipeline clear option inside the opcode (IPA v4.0+)
pub const OPCODE_CLEAR_OPTION_SHIFT: u32 = 9;

/// Register write opcode carrying a clear option in bits 10:9
pub const fn register_write_opcode(clear: PipelineClear) -> Opcode {
    let clear = (clear.raw() as u16) << OPCODE_CLEAR_OPTION_SHIFT;
    Opcode::new(CmdOpcode::RegisterWrite.raw() | clear)
}

/// Table kinds initialized through a table init command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// IPv4 filter table
    V4Filter,
    /// IPv6 filter table
    V6Filter,
    /// IPv4 routing table
    V4Route,
    /// IPv6 routing table
    V6Route,
}

impl TableKind {
    /// Init command for this table
    pub const fn opcode(self) -> CmdOpcode {
        match self {
            Self::V4Filter => CmdOpcode::IpV4FilterInit,
            Self::V6Filter => CmdOpcode::IpV6FilterInit,
            Self::V4Route => CmdOpcode::IpV4RoutingInit,
            Self::V6Route => CmdOpcode::IpV6RoutingInit,
        }
    }

    /// Whether the table holds IPv6 rules
    #[inline]
    pub const fn is_ipv6(self) -> bool {
        matches!(self, Self::V6Filter | Self::V6Route)
    }

    /// Whether the table holds routes rather than filters
    #[inline]
    pub const fn is_route(self) -> bool {
        matches!(self, Self::V4Route | Self::V6Route)
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ip = if self.is_ipv6() { '6' } else { '4' };
        let kind = if self.is_route() { "route" } else { "filter" };
        write!(f, "IPv{} {}", ip, kind)
    }
}
