//! # MSM8953
//!
//! IPA v2.6L behind a BAM DMA engine. Pipes are requested by endpoint
//! name, so no ring geometry is given.

use ipa_cmd::{MemId, MemRegion};
use ipa_core::{ChannelId, EndpointId, IpaVersion};
use ipa_trans::{ChannelData, EndpointData, ExecEnv};

use super::{IpaData, MemData, AP_LAN_RX};

const fn endpoint(
    name: &'static str,
    ee: ExecEnv,
    id: u8,
    toward_ipa: bool,
    command: bool,
) -> EndpointData {
    EndpointData {
        name,
        ee,
        channel_id: ChannelId::new(id),
        endpoint_id: EndpointId::new(id),
        toward_ipa,
        command,
        channel: ChannelData {
            tre_count: 0,
            event_count: 0,
            tlv_count: 0,
        },
    }
}

const fn region(id: MemId, offset: u32, size: u32, canary_count: u16) -> MemRegion {
    MemRegion {
        id,
        offset,
        size,
        canary_count,
    }
}

/// Endpoints; the modem programs its own
pub static ENDPOINTS: [EndpointData; 8] = [
    endpoint("cmd_tx", ExecEnv::Ap, 3, true, true),
    endpoint(AP_LAN_RX, ExecEnv::Ap, 2, false, false),
    endpoint("ap_modem_tx", ExecEnv::Ap, 4, true, false),
    endpoint("ap_modem_rx", ExecEnv::Ap, 5, false, false),
    endpoint("modem_lan_tx", ExecEnv::Modem, 6, true, false),
    endpoint("modem_cmd_tx", ExecEnv::Modem, 7, true, false),
    endpoint("modem_lan_rx", ExecEnv::Modem, 8, false, false),
    endpoint("modem_ap_rx", ExecEnv::Modem, 9, false, false),
];

/// IPA-local memory
pub static REGIONS: [MemRegion; 9] = [
    region(MemId::UcShared, 0x0000, 0x0080, 0),
    region(MemId::UcInfo, 0x0080, 0x0200, 2),
    region(MemId::V4Filter, 0x0288, 0x0058, 2),
    region(MemId::V6Filter, 0x02e8, 0x0058, 2),
    region(MemId::V4Route, 0x0348, 0x003c, 1),
    region(MemId::V6Route, 0x0388, 0x003c, 1),
    region(MemId::ModemHeader, 0x03c8, 0x0140, 2),
    region(MemId::Zip, 0x0510, 0x0200, 1),
    region(MemId::Modem, 0x0714, 0x18e8, 1),
];

/// Platform table
pub static DATA: IpaData = IpaData {
    version: IpaVersion::V2_6L,
    endpoints: &ENDPOINTS,
    mem: MemData {
        regions: &REGIONS,
        smem_id: 497,
        smem_size: 0x2000,
        imem_addr: 0,
        imem_size: 0,
    },
};
