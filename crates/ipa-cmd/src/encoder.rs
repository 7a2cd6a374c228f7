//! # Command Encoder
//!
//! Builds immediate command payloads for the hardware version at hand and
//! appends them to command transactions.
//!
//! ```text
//!   CmdEncoder::*_add(trans, ..)
//!        │
//!        ├─► encode the layout for this IPA version
//!        ├─► copy it into a command pool slot       (Trans::payload_alloc)
//!        └─► append (slot, size, direction, opcode) (Trans::add_command)
//! ```
//!
//! Builders never commit. [`CmdEncoder::tag_process`] is the one exception:
//! it allocates, fills and commits-and-waits a whole transaction.

use ipa_core::{
    ChannelId, CmdLayout, DmaAddr, DmaDirection, EndpointId, Error, IpaVersion, Opcode, Result,
};
use ipa_trans::{Trans, Transport, TransportExt};

use crate::opcode::{register_write_opcode, CmdOpcode, PipelineClear, TableKind};
use crate::payload::{current, legacy, IpPacketInit, PAYLOAD_UNION_SIZE};

/// Commands in a tag process transaction
pub const TAG_PROCESS_COUNT: u32 = 4;

/// Host-side location of one table and its size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableLocation {
    /// Offset in IPA-local memory, before the memory offset is applied
    pub offset: u32,
    /// Table size in bytes
    pub size: u16,
    /// Host address of the table contents
    pub addr: DmaAddr,
}

/// Where the AP's window into IPA-local memory lies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CmdConfig {
    /// Offset added to every IPA-local address
    pub mem_offset: u32,
    /// Size of the window
    pub mem_size: u32,
}

impl CmdConfig {
    /// Window of `mem_size` bytes at `mem_offset`
    pub const fn new(mem_offset: u32, mem_size: u32) -> Self {
        Self {
            mem_offset,
            mem_size,
        }
    }
}

/// Version-aware immediate command builder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmdEncoder {
    version: IpaVersion,
    mem_offset: u32,
    mem_size: u32,
}

impl CmdEncoder {
    /// Create an encoder.
    ///
    /// `mem_offset` is where the AP's view of IPA-local memory starts;
    /// `mem_size` is the size of that view.
    pub fn new(version: IpaVersion, mem_offset: u32, mem_size: u32) -> Self {
        Self {
            version,
            mem_offset,
            mem_size,
        }
    }

    /// Create an encoder from a memory window description
    pub fn from_config(version: IpaVersion, config: &CmdConfig) -> Self {
        Self::new(version, config.mem_offset, config.mem_size)
    }

    /// Hardware version
    #[inline]
    pub fn version(&self) -> IpaVersion {
        self.version
    }

    /// Payload layout generation
    #[inline]
    pub fn layout(&self) -> CmdLayout {
        self.version.cmd_layout()
    }

    /// Offset added to every IPA-local address
    #[inline]
    pub fn mem_offset(&self) -> u32 {
        self.mem_offset
    }

    /// Size of IPA-local memory
    #[inline]
    pub fn mem_size(&self) -> u32 {
        self.mem_size
    }

    /// Cookie the tag process tags its status with
    pub fn tag_cookie(&self) -> u64 {
        match self.layout() {
            CmdLayout::Legacy => legacy::TAG_COOKIE,
            CmdLayout::Current => current::TAG_COOKIE,
        }
    }

    /// IPA-local address of `offset`, memory offset applied
    fn local(&self, offset: u32) -> Result<u16> {
        offset
            .checked_add(self.mem_offset)
            .and_then(|local| u16::try_from(local).ok())
            .ok_or_else(|| {
                log::error!(
                    "local offset 0x{:x} + 0x{:x} beyond 16 bits",
                    offset,
                    self.mem_offset
                );
                Error::RegionOutOfRange
            })
    }

    fn add_payload<T: Transport + ?Sized>(
        trans: &mut Trans<'_, T>,
        kind: CmdOpcode,
        opcode: Opcode,
        bytes: &[u8],
        direction: DmaDirection,
    ) -> Result<()> {
        let addr = trans.payload_alloc(bytes)?;
        log::trace!(
            "channel {}: {} command, {} bytes at {}",
            trans.channel_id(),
            kind,
            bytes.len(),
            addr
        );
        trans.add_command(addr, bytes.len() as u32, direction, opcode)
    }

    // =========================================================================
    // BUILDERS
    // =========================================================================

    /// Initialize a filter or route table.
    ///
    /// The hashed table is ignored when its size is zero, and always on
    /// IPA v2.x, which has no hashed tables.
    pub fn table_init_add<T: Transport + ?Sized>(
        &self,
        trans: &mut Trans<'_, T>,
        kind: TableKind,
        table: TableLocation,
        hash: TableLocation,
    ) -> Result<()> {
        let opcode = kind.opcode();
        match self.layout() {
            CmdLayout::Legacy => {
                let rules_addr = addr32(table.addr)?;
                let local_addr = self.local(table.offset)?;
                if kind.is_ipv6() {
                    let payload = legacy::TableInitV6 {
                        rules_addr,
                        size: table.size,
                        local_addr,
                    };
                    Self::add_payload(
                        trans,
                        opcode,
                        opcode.into(),
                        &payload.encode(),
                        DmaDirection::ToDevice,
                    )
                } else {
                    let payload = legacy::TableInitV4 {
                        rules_addr,
                        size: table.size,
                        local_addr,
                    };
                    Self::add_payload(
                        trans,
                        opcode,
                        opcode.into(),
                        &payload.encode(),
                        DmaDirection::ToDevice,
                    )
                }
            }
            CmdLayout::Current => {
                let mut payload = current::TableInit {
                    nhash_size: table.size,
                    nhash_local: self.local(table.offset)?,
                    nhash_addr: table.addr.raw(),
                    ..Default::default()
                };
                if hash.size != 0 {
                    payload.hash_size = hash.size;
                    payload.hash_local = self.local(hash.offset)?;
                    payload.hash_addr = hash.addr.raw();
                }
                Self::add_payload(
                    trans,
                    opcode,
                    opcode.into(),
                    &payload.encode(),
                    DmaDirection::ToDevice,
                )
            }
        }
    }

    /// Initialize the header table at `offset`, copying `size` bytes from
    /// `addr`
    pub fn hdr_init_local_add<T: Transport + ?Sized>(
        &self,
        trans: &mut Trans<'_, T>,
        offset: u32,
        size: u16,
        addr: DmaAddr,
    ) -> Result<()> {
        let kind = CmdOpcode::HdrInitLocal;
        let local = self.local(offset)?;
        match self.layout() {
            CmdLayout::Legacy => {
                let payload = legacy::HdrInitLocal {
                    src_addr: addr32(addr)?,
                    size,
                    dst_addr: local,
                };
                Self::add_payload(
                    trans,
                    kind,
                    kind.into(),
                    &payload.encode(),
                    DmaDirection::ToDevice,
                )
            }
            CmdLayout::Current => {
                let payload = current::HdrInitLocal {
                    table_addr: addr.raw(),
                    size,
                    local_addr: local,
                };
                Self::add_payload(
                    trans,
                    kind,
                    kind.into(),
                    &payload.encode(),
                    DmaDirection::ToDevice,
                )
            }
        }
    }

    /// Write `value` under `mask` to the register at `offset`.
    ///
    /// `clear_full` waits for the whole pipeline to drain first; otherwise
    /// only header processing. IPA v2.x always clears with its default.
    pub fn register_write_add<T: Transport + ?Sized>(
        &self,
        trans: &mut Trans<'_, T>,
        offset: u32,
        value: u32,
        mask: u32,
        clear_full: bool,
    ) -> Result<()> {
        let kind = CmdOpcode::RegisterWrite;
        let clear = PipelineClear::for_write(clear_full);

        match self.layout() {
            CmdLayout::Legacy => {
                let payload = legacy::RegisterWrite {
                    skip_clear: false,
                    offset: offset as u16,
                    value,
                    mask,
                };
                Self::add_payload(
                    trans,
                    kind,
                    kind.into(),
                    &payload.encode(),
                    DmaDirection::None,
                )
            }
            CmdLayout::Current if self.version.opcode_carries_clear_option() => {
                let payload = current::RegisterWrite {
                    offset_high: ((offset >> 16) & 0xf) as u8,
                    skip_clear: false,
                    offset: offset as u16,
                    value,
                    mask,
                    clear_options: 0,
                };
                let opcode = register_write_opcode(clear);
                Self::add_payload(trans, kind, opcode, &payload.encode(), DmaDirection::None)
            }
            CmdLayout::Current => {
                let payload = current::RegisterWrite {
                    offset_high: 0,
                    skip_clear: false,
                    offset: offset as u16,
                    value,
                    mask,
                    clear_options: clear.raw(),
                };
                Self::add_payload(
                    trans,
                    kind,
                    kind.into(),
                    &payload.encode(),
                    DmaDirection::None,
                )
            }
        }
    }

    /// Copy `size` bytes between host memory at `addr` and IPA-local
    /// memory at `offset`; `toward_ipa` writes into the IPA
    pub fn dma_shared_mem_add<T: Transport + ?Sized>(
        &self,
        trans: &mut Trans<'_, T>,
        offset: u32,
        size: u16,
        addr: DmaAddr,
        toward_ipa: bool,
    ) -> Result<()> {
        let kind = CmdOpcode::DmaSharedMem;
        let direction = if toward_ipa {
            DmaDirection::ToDevice
        } else {
            DmaDirection::FromDevice
        };
        let local_addr = self.local(offset)?;

        match self.layout() {
            CmdLayout::Legacy => {
                let payload = legacy::DmaSharedMem {
                    size,
                    system_addr: addr32(addr)?,
                    local_addr,
                    read: !toward_ipa,
                };
                Self::add_payload(trans, kind, kind.into(), &payload.encode(), direction)
            }
            CmdLayout::Current => {
                let payload = current::DmaSharedMem {
                    clear_after_read: false,
                    size,
                    local_addr,
                    read: !toward_ipa,
                    system_addr: addr.raw(),
                };
                Self::add_payload(trans, kind, kind.into(), &payload.encode(), direction)
            }
        }
    }

    /// Deliver the next packet on the command channel straight to
    /// `endpoint`, skipping packet processing
    pub fn ip_packet_init_add<T: Transport + ?Sized>(
        &self,
        trans: &mut Trans<'_, T>,
        endpoint: EndpointId,
    ) -> Result<()> {
        let kind = CmdOpcode::IpPacketInit;
        let payload = IpPacketInit {
            dest_endpoint: endpoint.raw(),
        };
        Self::add_payload(
            trans,
            kind,
            kind.into(),
            &payload.encode(),
            DmaDirection::ToDevice,
        )
    }

    /// Tag the status of the next packet with `tag`
    pub fn tag_status_add<T: Transport + ?Sized>(
        &self,
        trans: &mut Trans<'_, T>,
        tag: u64,
    ) -> Result<()> {
        let kind = CmdOpcode::IpPacketTagStatus;
        match self.layout() {
            CmdLayout::Legacy => {
                let payload = legacy::TagStatus { tag };
                Self::add_payload(
                    trans,
                    kind,
                    kind.into(),
                    &payload.encode(),
                    DmaDirection::ToDevice,
                )
            }
            CmdLayout::Current => {
                let payload = current::TagStatus { tag };
                Self::add_payload(
                    trans,
                    kind,
                    kind.into(),
                    &payload.encode(),
                    DmaDirection::ToDevice,
                )
            }
        }
    }

    /// Send a zero-filled payload as plain data on the command channel
    pub fn transfer_add<T: Transport + ?Sized>(&self, trans: &mut Trans<'_, T>) -> Result<()> {
        let payload = [0u8; PAYLOAD_UNION_SIZE];
        Self::add_payload(
            trans,
            CmdOpcode::None,
            Opcode::NONE,
            &payload,
            DmaDirection::ToDevice,
        )
    }

    // =========================================================================
    // TAG PROCESS
    // =========================================================================

    /// Append the four commands that flush in-flight packets: a
    /// full-pipeline-clear register write, packet init toward `lan_rx`,
    /// a tagged status and a data transfer to carry it
    pub fn tag_process_add<T: Transport + ?Sized>(
        &self,
        trans: &mut Trans<'_, T>,
        lan_rx: EndpointId,
    ) -> Result<()> {
        self.register_write_add(trans, 0, 0, 0, true)?;
        self.ip_packet_init_add(trans, lan_rx)?;
        self.tag_status_add(trans, self.tag_cookie())?;
        self.transfer_add(trans)
    }

    /// Run a tag process on the command channel and wait for it
    pub fn tag_process<T: Transport + ?Sized>(
        &self,
        transport: &T,
        channel_id: ChannelId,
        lan_rx: EndpointId,
    ) -> Result<()> {
        let mut trans = transport
            .cmd_trans_alloc(channel_id, TAG_PROCESS_COUNT)
            .map_err(|err| {
                log::error!(
                    "error allocating {} entry tag transaction: {}",
                    TAG_PROCESS_COUNT,
                    err
                );
                err
            })?;

        self.tag_process_add(&mut trans, lan_rx)?;
        trans.commit_wait();

        Ok(())
    }
}

/// IPA v2.x commands carry 32-bit host addresses
fn addr32(addr: DmaAddr) -> Result<u32> {
    u32::try_from(addr.raw()).map_err(|_| {
        log::error!("address {} beyond 32 bits", addr);
        Error::InvalidParameter
    })
}
