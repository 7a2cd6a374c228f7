//! # Endpoint Data
//!
//! Static description of the endpoints a platform wires to transport
//! channels. Both backends build their channels from the same table.

use ipa_core::{ChannelId, EndpointId};

/// Execution environment owning a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecEnv {
    /// Application processor; this driver
    #[default]
    Ap,
    /// Modem; programmed by modem firmware
    Modem,
}

/// Ring geometry of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelData {
    /// Ring elements; a power of two
    pub tre_count: u32,
    /// Event ring elements
    pub event_count: u32,
    /// Descriptor FIFO depth, bounding descriptors per transaction
    pub tlv_count: u32,
}

/// One endpoint and the channel carrying it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointData {
    /// Endpoint name; BAM channels are requested by it
    pub name: &'static str,
    /// Owning execution environment
    pub ee: ExecEnv,
    /// Transport channel
    pub channel_id: ChannelId,
    /// IPA endpoint
    pub endpoint_id: EndpointId,
    /// Data flows from the host toward the IPA
    pub toward_ipa: bool,
    /// Carries immediate commands
    pub command: bool,
    /// Ring geometry; all zero on BAM platforms
    pub channel: ChannelData,
}

impl EndpointData {
    /// Whether this driver programs the channel
    #[inline]
    pub fn is_ap(&self) -> bool {
        self.ee == ExecEnv::Ap
    }

    /// An AP entry without a ring describes nothing
    pub fn is_empty(&self) -> bool {
        self.is_ap() && self.channel.tlv_count == 0 && self.name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_entry() {
        let mut data = EndpointData {
            name: "",
            ee: ExecEnv::Ap,
            channel_id: ChannelId::new(0),
            endpoint_id: EndpointId::new(0),
            toward_ipa: true,
            command: false,
            channel: ChannelData::default(),
        };
        assert!(data.is_empty());

        data.ee = ExecEnv::Modem;
        assert!(!data.is_empty());

        data.ee = ExecEnv::Ap;
        data.name = "tx";
        assert!(!data.is_empty());
    }
}
