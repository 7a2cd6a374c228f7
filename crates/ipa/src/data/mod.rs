//! # Platform Data
//!
//! Per-SoC tables describing the hardware version, the endpoints wired to
//! transport channels and the layout of IPA-local memory. Tables are
//! `'static` and never modified.

pub mod msm8953;

use ipa_cmd::{CmdConfig, MemId, MemRegion};
use ipa_core::IpaVersion;
use ipa_trans::EndpointData;

/// Name of the AP receive endpoint that tag process status is sent to
pub const AP_LAN_RX: &str = "ap_lan_rx";

/// IPA-local and shared memory layout
#[derive(Debug, Clone, Copy)]
pub struct MemData {
    /// IPA-local regions
    pub regions: &'static [MemRegion],
    /// Shared memory item holding the modem's share
    pub smem_id: u32,
    /// Size of that item
    pub smem_size: u32,
    /// IMEM window for the IPA, zero when absent
    pub imem_addr: u32,
    /// Size of the IMEM window
    pub imem_size: u32,
}

impl MemData {
    /// Region by id
    pub fn region(&self, id: MemId) -> Option<&'static MemRegion> {
        MemRegion::find(self.regions, id)
    }

    /// First byte past the highest region
    pub fn local_end(&self) -> u32 {
        self.regions.iter().map(MemRegion::end).max().unwrap_or(0)
    }

    /// Command window covering every region, placed at `mem_offset`
    pub fn cmd_config(&self, mem_offset: u32) -> CmdConfig {
        CmdConfig::new(mem_offset, self.local_end().max(self.smem_size))
    }
}

/// Everything the driver core needs to know about one SoC
#[derive(Debug, Clone, Copy)]
pub struct IpaData {
    /// Hardware version
    pub version: IpaVersion,
    /// Endpoints, AP-owned and modem-owned
    pub endpoints: &'static [EndpointData],
    /// Memory layout
    pub mem: MemData,
}

impl IpaData {
    /// The AP endpoint carrying immediate commands
    pub fn command_endpoint(&self) -> Option<&'static EndpointData> {
        self.endpoints
            .iter()
            .find(|endpoint| endpoint.is_ap() && endpoint.command)
    }

    /// Endpoint by name
    pub fn endpoint(&self, name: &str) -> Option<&'static EndpointData> {
        self.endpoints.iter().find(|endpoint| endpoint.name == name)
    }
}
