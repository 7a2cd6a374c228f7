//! # Platform Abstraction
//!
//! The services a host operating system provides to the driver core.

use ipa_core::{DmaAddr, DmaDirection, HostBuffer, Result};

use crate::dma::CoherentMemory;

/// Page granule used to size coherent allocations
pub const PAGE_SIZE: usize = 4096;

// =============================================================================
// PLATFORM TRAIT
// =============================================================================

/// Platform abstraction trait
///
/// Each host (Helix, Linux glue, the std simulator) implements this trait to
/// give the driver DMA-capable memory and a clock.
pub trait DmaPlatform: Send + Sync {
    /// Get platform name
    fn name(&self) -> &'static str;

    /// Allocate zeroed, physically contiguous, coherent DMA memory
    fn alloc_coherent(&self, size: usize) -> Result<CoherentMemory>;

    /// Return coherent memory obtained from [`DmaPlatform::alloc_coherent`]
    fn free_coherent(&self, mem: CoherentMemory);

    /// Map a host buffer for a single streaming transfer
    fn map_single(&self, buf: HostBuffer, direction: DmaDirection) -> Result<DmaAddr>;

    /// Undo a [`DmaPlatform::map_single`]
    fn unmap_single(&self, addr: DmaAddr, len: u32, direction: DmaDirection);

    /// Sleep for microseconds (busy-wait in no_std)
    fn sleep_us(&self, us: u64);

    /// Get current time in nanoseconds
    fn time_ns(&self) -> u64;
}

/// Round a coherent allocation up to a power-of-two number of pages
pub fn coherent_alloc_size(size: usize) -> usize {
    let pages = size.div_ceil(PAGE_SIZE).max(1);
    pages.next_power_of_two() * PAGE_SIZE
}

// =============================================================================
// ARCHITECTURE HELPERS
// =============================================================================

/// Architecture-specific operations
pub mod arch {
    //! Architecture-specific helpers

    /// Memory barrier
    #[inline(always)]
    pub fn memory_barrier() {
        core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
    }

    /// Write barrier ordering descriptor stores before a doorbell write
    #[inline(always)]
    pub fn dma_wmb() {
        cfg_if::cfg_if! {
            if #[cfg(target_arch = "aarch64")] {
                // SAFETY: dmb oshst only orders stores
                unsafe {
                    core::arch::asm!("dmb oshst", options(nostack, preserves_flags));
                }
            } else {
                core::sync::atomic::fence(core::sync::atomic::Ordering::Release);
            }
        }
    }

    /// Pause hint for spin loops
    #[inline(always)]
    pub fn spin_hint() {
        core::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coherent_alloc_size() {
        assert_eq!(coherent_alloc_size(1), PAGE_SIZE);
        assert_eq!(coherent_alloc_size(PAGE_SIZE), PAGE_SIZE);
        assert_eq!(coherent_alloc_size(PAGE_SIZE + 1), 2 * PAGE_SIZE);
        assert_eq!(coherent_alloc_size(3 * PAGE_SIZE), 4 * PAGE_SIZE);
    }
}
