//! # Coherent DMA Memory
//!
//! A CPU mapping of memory the IPA also addresses, with bounds-checked
//! byte access.

use core::fmt;
use core::ptr::NonNull;

use ipa_core::DmaAddr;

/// Coherent DMA memory region
///
/// Callers writing through a shared reference must write disjoint ranges;
/// the driver core guarantees this through descriptor reservation.
pub struct CoherentMemory {
    virt: NonNull<u8>,
    addr: DmaAddr,
    size: usize,
}

impl CoherentMemory {
    /// Wrap a coherent allocation
    ///
    /// # Safety
    /// - `virt` must be valid for reads and writes of `size` bytes
    /// - `addr` must be the device address of the same memory
    /// - the memory must stay valid until handed back to its platform
    pub unsafe fn from_raw_parts(virt: NonNull<u8>, addr: DmaAddr, size: usize) -> Self {
        Self { virt, addr, size }
    }

    /// Device address of the first byte
    #[inline]
    pub fn addr(&self) -> DmaAddr {
        self.addr
    }

    /// Size in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// CPU address of the first byte
    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.virt.as_ptr()
    }

    /// Copy `bytes` into the region at `offset`
    pub fn write(&self, offset: usize, bytes: &[u8]) {
        self.check(offset, bytes.len());
        // SAFETY: range checked above; see the type-level note on disjoint writes
        unsafe {
            core::ptr::copy_nonoverlapping(bytes.as_ptr(), self.as_ptr().add(offset), bytes.len());
        }
    }

    /// Copy bytes at `offset` out of the region
    pub fn read(&self, offset: usize, out: &mut [u8]) {
        self.check(offset, out.len());
        // SAFETY: range checked above
        unsafe {
            core::ptr::copy_nonoverlapping(self.as_ptr().add(offset), out.as_mut_ptr(), out.len());
        }
    }

    /// Zero `len` bytes at `offset`
    pub fn zero(&self, offset: usize, len: usize) {
        self.check(offset, len);
        // SAFETY: range checked above
        unsafe {
            core::ptr::write_bytes(self.as_ptr().add(offset), 0, len);
        }
    }

    #[inline]
    fn check(&self, offset: usize, len: usize) {
        assert!(
            offset <= self.size && len <= self.size - offset,
            "coherent access out of bounds: {:#x}+{:#x} > {:#x}",
            offset,
            len,
            self.size
        );
    }
}

impl fmt::Debug for CoherentMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoherentMemory")
            .field("addr", &self.addr)
            .field("size", &self.size)
            .finish()
    }
}

// SAFETY: the region is plain memory shared with a device; access rules are
// documented on the type
unsafe impl Send for CoherentMemory {}
unsafe impl Sync for CoherentMemory {}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    #[test]
    fn test_read_write() {
        let mut backing = vec![0u8; 64];
        let virt = NonNull::new(backing.as_mut_ptr()).unwrap();
        // SAFETY: backing outlives mem
        let mem = unsafe { CoherentMemory::from_raw_parts(virt, DmaAddr::new(0x4000), 64) };

        mem.write(8, &[1, 2, 3, 4]);
        let mut out = [0u8; 4];
        mem.read(8, &mut out);
        assert_eq!(out, [1, 2, 3, 4]);

        mem.zero(8, 2);
        mem.read(8, &mut out);
        assert_eq!(out, [0, 0, 3, 4]);
    }

    #[test]
    #[should_panic]
    fn test_out_of_bounds() {
        let mut backing = vec![0u8; 16];
        let virt = NonNull::new(backing.as_mut_ptr()).unwrap();
        // SAFETY: backing outlives mem
        let mem = unsafe { CoherentMemory::from_raw_parts(virt, DmaAddr::new(0x4000), 16) };
        mem.write(12, &[0; 8]);
    }
}
