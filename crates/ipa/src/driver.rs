//! # Driver Object
//!
//! One IPA instance: its transport, its command channel and the encoder
//! that speaks the instance's command layout.
//!
//! ```text
//!   new ──► Backend::new ──► validate regions ──► setup ──► commands
//!                                                   │
//!                                exit ◄── teardown ◄┘
//! ```

use alloc::sync::Arc;
use core::fmt;

use ipa_bam::DmaEngine;
use ipa_cmd::{CmdConfig, CmdEncoder};
use ipa_core::{ChannelId, EndpointId, Error, IpaVersion, Result};
use ipa_gsi::GsiHardware;
use ipa_hal::DmaPlatform;
use ipa_trans::{TransClient, Transport, TransportExt};

use crate::backend::{Backend, Hardware};
use crate::data::{IpaData, AP_LAN_RX};

/// An IPA instance
pub struct Ipa<H: GsiHardware, E: DmaEngine> {
    data: &'static IpaData,
    backend: Backend<H, E>,
    encoder: CmdEncoder,
    command: ChannelId,
    lan_rx: EndpointId,
}

impl<H: GsiHardware, E: DmaEngine> Ipa<H, E> {
    /// Build the transport and command encoder for the platform in `data`
    pub fn new(
        platform: Arc<dyn DmaPlatform>,
        data: &'static IpaData,
        hardware: Hardware<H, E>,
        config: CmdConfig,
    ) -> Result<Self> {
        let Some(command) = data.command_endpoint() else {
            log::error!("ipa: no AP command endpoint");
            return Err(Error::InvalidParameter);
        };
        let Some(lan_rx) = data.endpoint(AP_LAN_RX) else {
            log::error!("ipa: no {} endpoint", AP_LAN_RX);
            return Err(Error::InvalidParameter);
        };

        let encoder = CmdEncoder::from_config(data.version, &config);
        #[cfg(feature = "validate")]
        Self::mem_valid(&encoder, data)?;

        let backend = Backend::new(data.version, platform, hardware, data.endpoints)?;

        log::info!(
            "ipa: IPA {} over {:?}, command channel {}",
            data.version,
            backend.kind(),
            command.channel_id
        );
        Ok(Self {
            data,
            backend,
            encoder,
            command: command.channel_id,
            lan_rx: lan_rx.endpoint_id,
        })
    }

    #[cfg(feature = "validate")]
    fn mem_valid(encoder: &CmdEncoder, data: &IpaData) -> Result<()> {
        use ipa_cmd::{MemId, TableKind};

        let tables = [
            (MemId::V4Filter, TableKind::V4Filter),
            (MemId::V6Filter, TableKind::V6Filter),
            (MemId::V4Route, TableKind::V4Route),
            (MemId::V6Route, TableKind::V6Route),
        ];
        for (id, kind) in tables {
            if let Some(region) = data.mem.region(id) {
                encoder.table_valid(region, kind, false)?;
            }
        }

        if let Some(modem) = data.mem.region(MemId::ModemHeader) {
            encoder.header_valid(modem, data.mem.region(MemId::ApHeader))?;
        }
        Ok(())
    }

    /// Platform table
    #[inline]
    pub fn data(&self) -> &'static IpaData {
        self.data
    }

    /// Hardware version
    #[inline]
    pub fn version(&self) -> IpaVersion {
        self.data.version
    }

    /// Transport
    #[inline]
    pub fn transport(&self) -> &Backend<H, E> {
        &self.backend
    }

    /// Command encoder
    #[inline]
    pub fn encoder(&self) -> &CmdEncoder {
        &self.encoder
    }

    /// Channel carrying immediate commands
    #[inline]
    pub fn command_channel(&self) -> ChannelId {
        self.command
    }

    /// Program the transport and start the command channel
    pub fn setup(&self) -> Result<()> {
        self.backend.setup()?;
        if let Err(err) = self.backend.channel_start(self.command) {
            log::error!("ipa: command channel {} start failed: {}", self.command, err);
            self.backend.teardown();
            return Err(err);
        }
        Ok(())
    }

    /// Undo [`Ipa::setup`]
    pub fn teardown(&self) {
        if let Err(err) = self.backend.channel_stop(self.command) {
            log::warn!("ipa: command channel {} stop failed: {}", self.command, err);
        }
        self.backend.teardown();
    }

    /// Release every channel; the instance is unusable afterwards
    pub fn exit(&mut self) {
        self.backend.exit();
    }

    /// Flush packets in flight through the pipeline, waiting until the
    /// status reaches the AP
    pub fn tag_process(&self) -> Result<()> {
        self.encoder
            .tag_process(&self.backend, self.command, self.lan_rx)
    }

    /// Write `value` under `mask` to an IPA register and wait for it
    pub fn register_write(
        &self,
        offset: u32,
        value: u32,
        mask: u32,
        clear_full: bool,
    ) -> Result<()> {
        #[cfg(feature = "validate")]
        self.encoder.register_write_offset_valid("register", offset)?;

        let mut trans = self.backend.cmd_trans_alloc(self.command, 1)?;
        self.encoder
            .register_write_add(&mut trans, offset, value, mask, clear_full)?;
        trans.commit_wait();
        Ok(())
    }

    /// Bind the upper-layer client of a channel
    pub fn set_client(&self, channel_id: ChannelId, client: Arc<dyn TransClient>) -> Result<()> {
        self.backend.channel_set_client(channel_id, client)
    }

    /// Completion interrupt or callback for a channel
    #[inline]
    pub fn irq(&self, channel_id: ChannelId) -> bool {
        self.backend.irq(channel_id)
    }

    /// Finalize up to `budget` completed transactions of a channel
    #[inline]
    pub fn poll(&self, channel_id: ChannelId, budget: u32) -> Result<u32> {
        self.backend.channel_poll(channel_id, budget)
    }
}

impl<H, E> fmt::Debug for Ipa<H, E>
where
    H: GsiHardware + fmt::Debug,
    E: DmaEngine + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ipa")
            .field("version", &self.data.version)
            .field("backend", &self.backend)
            .field("encoder", &self.encoder)
            .field("command", &self.command)
            .field("lan_rx", &self.lan_rx)
            .finish()
    }
}
