//! # Host Platform
//!
//! A [`DmaPlatform`] backed by the process heap. Device addresses are
//! synthetic bus addresses handed out from a private window, so nothing here
//! ever reaches real hardware. Used to run the driver core against simulated
//! hardware and by the test suites.

use alloc::vec::Vec;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::time::{Duration, Instant};

use spin::Mutex;

use ipa_core::{DmaAddr, DmaDirection, Error, HostBuffer, Result};

use crate::dma::CoherentMemory;
use crate::platform::{coherent_alloc_size, DmaPlatform, PAGE_SIZE};

/// First synthetic bus address handed out
const IOVA_BASE: u64 = 0x8000_0000;

/// A live streaming mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    /// Bus address handed to the device
    pub addr: DmaAddr,
    /// Mapped host buffer
    pub buffer: HostBuffer,
    /// Direction of the mapping
    pub direction: DmaDirection,
}

#[derive(Debug, Clone, Copy)]
struct CoherentRegion {
    addr: DmaAddr,
    virt: usize,
    size: usize,
}

/// Heap-backed platform for simulation
#[derive(Debug)]
pub struct HostPlatform {
    start: Instant,
    next_iova: AtomicU64,
    mappings: Mutex<Vec<Mapping>>,
    coherent: Mutex<Vec<CoherentRegion>>,
    fail_next_map: AtomicBool,
}

impl HostPlatform {
    /// Create a platform with an empty address window
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            next_iova: AtomicU64::new(IOVA_BASE),
            mappings: Mutex::new(Vec::new()),
            coherent: Mutex::new(Vec::new()),
            fail_next_map: AtomicBool::new(false),
        }
    }

    /// Number of streaming mappings currently alive
    pub fn mapped_count(&self) -> usize {
        self.mappings.lock().len()
    }

    /// Snapshot of live streaming mappings
    pub fn mappings(&self) -> Vec<Mapping> {
        self.mappings.lock().clone()
    }

    /// Number of coherent allocations currently alive
    pub fn coherent_count(&self) -> usize {
        self.coherent.lock().len()
    }

    /// Make the next [`DmaPlatform::map_single`] call fail
    pub fn fail_next_map(&self) {
        self.fail_next_map.store(true, Ordering::Release);
    }

    /// Read device-visible coherent memory through its bus address.
    ///
    /// Returns `false` if the range is not inside a live coherent
    /// allocation.
    pub fn read_coherent(&self, addr: DmaAddr, out: &mut [u8]) -> bool {
        let coherent = self.coherent.lock();
        let Some(region) = coherent.iter().find(|r| {
            addr >= r.addr && addr.raw() + out.len() as u64 <= r.addr.raw() + r.size as u64
        }) else {
            return false;
        };
        let offset = (addr.raw() - region.addr.raw()) as usize;
        // SAFETY: the region is live while it is listed and the range was checked
        unsafe {
            core::ptr::copy_nonoverlapping(
                (region.virt as *const u8).add(offset),
                out.as_mut_ptr(),
                out.len(),
            );
        }
        true
    }

    fn alloc_iova(&self, size: usize) -> DmaAddr {
        let span = size.max(1).next_multiple_of(PAGE_SIZE) as u64;
        DmaAddr::new(self.next_iova.fetch_add(span, Ordering::Relaxed))
    }
}

impl Default for HostPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl DmaPlatform for HostPlatform {
    fn name(&self) -> &'static str {
        "host"
    }

    fn alloc_coherent(&self, size: usize) -> Result<CoherentMemory> {
        let size = coherent_alloc_size(size);
        let layout = Layout::from_size_align(size, PAGE_SIZE).map_err(|_| Error::InvalidParameter)?;
        // SAFETY: layout has a non-zero size
        let virt = NonNull::new(unsafe { alloc_zeroed(layout) }).ok_or(Error::OutOfMemory)?;
        let addr = self.alloc_iova(size);

        self.coherent.lock().push(CoherentRegion {
            addr,
            virt: virt.as_ptr() as usize,
            size,
        });
        log::trace!("host: coherent {:#x} bytes at {}", size, addr);

        // SAFETY: freshly allocated, zeroed, owned until free_coherent
        Ok(unsafe { CoherentMemory::from_raw_parts(virt, addr, size) })
    }

    fn free_coherent(&self, mem: CoherentMemory) {
        let mut coherent = self.coherent.lock();
        let Some(index) = coherent.iter().position(|r| r.addr == mem.addr()) else {
            log::warn!("host: freeing unknown coherent region {}", mem.addr());
            return;
        };
        let region = coherent.swap_remove(index);
        drop(coherent);

        // Cannot fail: the same layout was accepted at allocation time
        if let Ok(layout) = Layout::from_size_align(region.size, PAGE_SIZE) {
            // SAFETY: allocated by alloc_coherent with this layout
            unsafe { dealloc(region.virt as *mut u8, layout) };
        }
    }

    fn map_single(&self, buf: HostBuffer, direction: DmaDirection) -> Result<DmaAddr> {
        if self.fail_next_map.swap(false, Ordering::AcqRel) {
            return Err(Error::MappingFailed);
        }
        let addr = self.alloc_iova(buf.len as usize);
        self.mappings.lock().push(Mapping {
            addr,
            buffer: buf,
            direction,
        });
        Ok(addr)
    }

    fn unmap_single(&self, addr: DmaAddr, len: u32, direction: DmaDirection) {
        let mut mappings = self.mappings.lock();
        match mappings.iter().position(|m| m.addr == addr) {
            Some(index) => {
                let mapping = mappings.swap_remove(index);
                if mapping.buffer.len != len || mapping.direction != direction {
                    log::warn!("host: unmap of {} does not match its mapping", addr);
                }
            }
            None => log::warn!("host: unmap of unknown address {}", addr),
        }
    }

    fn sleep_us(&self, us: u64) {
        std::thread::sleep(Duration::from_micros(us));
    }

    fn time_ns(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coherent_roundtrip() {
        let platform = HostPlatform::new();
        let mem = platform.alloc_coherent(100).unwrap();
        assert_eq!(mem.size(), PAGE_SIZE);
        assert_eq!(platform.coherent_count(), 1);

        mem.write(16, &[0xaa, 0xbb]);
        let mut out = [0u8; 2];
        assert!(platform.read_coherent(mem.addr() + 16, &mut out));
        assert_eq!(out, [0xaa, 0xbb]);

        platform.free_coherent(mem);
        assert_eq!(platform.coherent_count(), 0);
    }

    #[test]
    fn test_mapping_ledger() {
        let platform = HostPlatform::new();
        let buf = HostBuffer::new(0x1000, 64);
        let addr = platform.map_single(buf, DmaDirection::ToDevice).unwrap();
        assert_eq!(platform.mapped_count(), 1);

        platform.unmap_single(addr, 64, DmaDirection::ToDevice);
        assert_eq!(platform.mapped_count(), 0);
    }

    #[test]
    fn test_injected_map_failure() {
        let platform = HostPlatform::new();
        platform.fail_next_map();
        let buf = HostBuffer::new(0x1000, 64);
        assert_eq!(
            platform.map_single(buf, DmaDirection::FromDevice),
            Err(Error::MappingFailed)
        );
        assert!(platform.map_single(buf, DmaDirection::FromDevice).is_ok());
    }

    #[test]
    fn test_clock_advances() {
        let platform = HostPlatform::new();
        let before = platform.time_ns();
        platform.sleep_us(100);
        assert!(platform.time_ns() > before);
    }
}
