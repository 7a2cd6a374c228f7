//! # Resource Pools
//!
//! Fixed-capacity allocators backing transactions, fragment lists and
//! command payloads.
//!
//! ```text
//!   run:     0        1        2        3         free ring
//!        ┌────────┬────────┬────────┬────────┐   ┌───┬───┐
//!        │ A A A  │        │ C      │ B B    │   │ 1 │ … │
//!        └────────┴────────┴────────┴────────┘   └───┴───┘
//!         max_alloc slots per run                  ▲ next alloc
//! ```
//!
//! A pool of `count` entries holds `count` runs of `max_alloc` slots. Free
//! run indices sit in a ring; allocation takes the oldest, release appends
//! to the tail. Runs are returned individually, so holders may retire in
//! any order without a live run ever being handed out again.
//!
//! The owning channel reserves descriptors before it touches a pool, and
//! the number of descriptors it can hand out bounds the number of live
//! runs; an empty ring means that reservation was bypassed and surfaces as
//! [`Error::Capacity`]. Asking for zero entries or more than `max_alloc` is
//! a programming error and panics.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::sync::Arc;
use core::fmt;
use core::mem::ManuallyDrop;

use spin::Mutex;

use ipa_core::{DmaAddr, Error, Result};
use ipa_hal::platform::coherent_alloc_size;
use ipa_hal::{CoherentMemory, DmaPlatform};

// =============================================================================
// RECYCLING
// =============================================================================

/// Slot re-initialization performed on every allocation
pub trait Recycle {
    /// Reset the slot to its freshly-created state
    fn recycle(&self);
}

impl<T: Default> Recycle for Mutex<T> {
    fn recycle(&self) {
        *self.lock() = T::default();
    }
}

fn validate(count: u32, max_alloc: u32) -> Result<()> {
    if max_alloc == 0 || count < max_alloc {
        log::error!(
            "pool: invalid geometry, count {} max_alloc {}",
            count,
            max_alloc
        );
        return Err(Error::Capacity);
    }
    Ok(())
}

// =============================================================================
// FREE RING
// =============================================================================

struct RingState {
    free: VecDeque<u32>,
    live: Box<[bool]>,
}

/// Ring of free entry indices with a live flag per entry
struct FreeRing {
    state: Mutex<RingState>,
}

impl FreeRing {
    fn new(count: u32) -> Self {
        Self {
            state: Mutex::new(RingState {
                free: (0..count).collect(),
                live: (0..count).map(|_| false).collect(),
            }),
        }
    }

    fn take(&self) -> Option<u32> {
        let mut state = self.state.lock();
        let index = state.free.pop_front()?;
        state.live[index as usize] = true;
        Some(index)
    }

    fn put(&self, index: u32) {
        let mut state = self.state.lock();
        match state.live.get_mut(index as usize) {
            Some(live) if *live => *live = false,
            _ => {
                log::error!("pool: entry {} released while free", index);
                return;
            }
        }
        state.free.push_back(index);
    }

    fn available(&self) -> u32 {
        self.state.lock().free.len() as u32
    }
}

// =============================================================================
// RESOURCE POOL
// =============================================================================

/// Pool of in-memory slots handed out in fixed-width runs
pub struct ResourcePool<T> {
    slots: Box<[T]>,
    count: u32,
    max_alloc: u32,
    ring: FreeRing,
}

impl<T: Recycle> ResourcePool<T> {
    /// Create a pool of `count` runs of `max_alloc` slots, `init` building
    /// each slot
    pub fn new(count: u32, max_alloc: u32, mut init: impl FnMut() -> T) -> Result<Self> {
        validate(count, max_alloc)?;

        let total = count.checked_mul(max_alloc).ok_or(Error::Capacity)?;
        let slots: Box<[T]> = (0..total).map(|_| init()).collect();

        Ok(Self {
            slots,
            count,
            max_alloc,
            ring: FreeRing::new(count),
        })
    }

    /// Allocate `count` consecutive slots, returning the first index.
    ///
    /// The run is recycled before it is handed out.
    pub fn alloc(&self, count: u32) -> Result<u32> {
        assert!(
            count > 0 && count <= self.max_alloc,
            "pool: allocation of {} exceeds max_alloc {}",
            count,
            self.max_alloc
        );

        let Some(run) = self.ring.take() else {
            log::error!("pool: all {} runs in use", self.count);
            return Err(Error::Capacity);
        };
        let first = run * self.max_alloc;
        for slot in &self.slots[first as usize..(first + count) as usize] {
            slot.recycle();
        }
        Ok(first)
    }

    /// Return the run starting at `first`
    pub fn free(&self, first: u32) {
        debug_assert_eq!(first % self.max_alloc, 0, "pool: {} is not a run start", first);
        self.ring.put(first / self.max_alloc);
    }

    /// Slot at `index`
    #[inline]
    pub fn get(&self, index: u32) -> &T {
        &self.slots[index as usize]
    }

    /// Number of runs
    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Runs not currently allocated
    pub fn available(&self) -> u32 {
        self.ring.available()
    }

    /// Largest run a single allocation may claim
    #[inline]
    pub fn max_alloc(&self) -> u32 {
        self.max_alloc
    }
}

impl<T> fmt::Debug for ResourcePool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePool")
            .field("count", &self.count)
            .field("max_alloc", &self.max_alloc)
            .field("available", &self.ring.available())
            .finish()
    }
}

// =============================================================================
// DMA POOL
// =============================================================================

/// One slot handed out by a [`DmaPool`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaSlot {
    /// Byte offset inside the pool
    pub offset: u32,
    /// Device address of the slot
    pub addr: DmaAddr,
}

/// Pool of single slots in coherent DMA memory
pub struct DmaPool {
    platform: Arc<dyn DmaPlatform>,
    mem: ManuallyDrop<CoherentMemory>,
    size: u32,
    count: u32,
    max_alloc: u32,
    ring: FreeRing,
}

impl DmaPool {
    /// Create a pool of `count` elements of `size` bytes.
    ///
    /// The element size is rounded up to a power of two and the allocation
    /// to a power-of-two number of pages, sized for `count + max_alloc - 1`
    /// elements; the pool then holds as many elements as fit.
    pub fn new(
        platform: Arc<dyn DmaPlatform>,
        size: usize,
        count: u32,
        max_alloc: u32,
    ) -> Result<Self> {
        if size == 0 || size % 8 != 0 {
            log::error!("pool: invalid DMA element size {}", size);
            return Err(Error::InvalidParameter);
        }
        validate(count, max_alloc)?;

        let size = size.next_power_of_two();
        let total = coherent_alloc_size((count + max_alloc - 1) as usize * size);
        let mem = platform.alloc_coherent(total)?;
        let count = (mem.size() / size) as u32;

        log::trace!(
            "pool: {} DMA slots of {} bytes at {}",
            count,
            size,
            mem.addr()
        );

        Ok(Self {
            platform,
            mem: ManuallyDrop::new(mem),
            size: size as u32,
            count,
            max_alloc,
            ring: FreeRing::new(count),
        })
    }

    /// Allocate one zeroed slot
    pub fn alloc(&self) -> Result<DmaSlot> {
        let Some(index) = self.ring.take() else {
            log::error!("pool: all {} DMA slots in use", self.count);
            return Err(Error::Capacity);
        };
        let offset = index * self.size;
        self.mem.zero(offset as usize, self.size as usize);
        Ok(DmaSlot {
            offset,
            addr: self.mem.addr() + offset as u64,
        })
    }

    /// Return an allocated slot
    pub fn free(&self, slot: DmaSlot) {
        self.ring.put(slot.offset / self.size);
    }

    /// Replace the contents of an allocated slot with `bytes`, zero-padded
    pub fn write(&self, slot: DmaSlot, bytes: &[u8]) {
        assert!(bytes.len() <= self.size as usize);
        self.mem.zero(slot.offset as usize, self.size as usize);
        self.mem.write(slot.offset as usize, bytes);
    }

    /// Copy the start of an allocated slot into `out`
    pub fn read(&self, slot: DmaSlot, out: &mut [u8]) {
        assert!(out.len() <= self.size as usize);
        self.mem.read(slot.offset as usize, out);
    }

    /// Element size after rounding
    #[inline]
    pub fn element_size(&self) -> u32 {
        self.size
    }

    /// Number of elements the backing memory holds
    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Elements not currently allocated
    pub fn available(&self) -> u32 {
        self.ring.available()
    }

    /// Geometry limit the pool was sized with
    #[inline]
    pub fn max_alloc(&self) -> u32 {
        self.max_alloc
    }

    /// Device address of the first slot
    #[inline]
    pub fn base(&self) -> DmaAddr {
        self.mem.addr()
    }

    /// Release the backing memory
    pub fn exit(self) {}
}

impl Drop for DmaPool {
    fn drop(&mut self) {
        // SAFETY: taken exactly once, and `mem` is never used afterwards
        let mem = unsafe { ManuallyDrop::take(&mut self.mem) };
        self.platform.free_coherent(mem);
    }
}

impl fmt::Debug for DmaPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DmaPool")
            .field("base", &self.mem.addr())
            .field("size", &self.size)
            .field("count", &self.count)
            .field("available", &self.ring.available())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use core::sync::atomic::{AtomicU32, Ordering};

    use ipa_hal::host::HostPlatform;
    use ipa_hal::PAGE_SIZE;

    use super::*;

    #[derive(Debug, Default)]
    struct Slot {
        recycled: AtomicU32,
    }

    impl Recycle for Slot {
        fn recycle(&self) {
            self.recycled.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_geometry_validation() {
        assert_eq!(
            ResourcePool::new(4, 0, Slot::default).err(),
            Some(Error::Capacity)
        );
        assert_eq!(
            ResourcePool::new(4, 5, Slot::default).err(),
            Some(Error::Capacity)
        );

        let pool = ResourcePool::new(8, 3, Slot::default).unwrap();
        assert_eq!(pool.count(), 8);
        assert_eq!(pool.available(), 8);
        assert_eq!(pool.max_alloc(), 3);
    }

    #[test]
    fn test_runs_are_fixed_width() {
        let pool = ResourcePool::new(3, 4, Slot::default).unwrap();
        assert_eq!(pool.alloc(1).unwrap(), 0);
        assert_eq!(pool.alloc(4).unwrap(), 4);
        assert_eq!(pool.alloc(2).unwrap(), 8);
        assert_eq!(pool.available(), 0);
        assert_eq!(pool.alloc(1).err(), Some(Error::Capacity));
    }

    #[test]
    fn test_out_of_order_release() {
        let pool = ResourcePool::new(3, 2, Slot::default).unwrap();
        let held = pool.alloc(2).unwrap();
        let second = pool.alloc(1).unwrap();
        let third = pool.alloc(1).unwrap();

        // Later runs retire first and cycle several times
        pool.free(third);
        pool.free(second);
        for _ in 0..5 {
            let a = pool.alloc(2).unwrap();
            let b = pool.alloc(2).unwrap();
            assert_ne!(a, held);
            assert_ne!(b, held);
            pool.free(b);
            pool.free(a);
        }

        pool.free(held);
        assert_eq!(pool.available(), 3);
    }

    #[test]
    fn test_double_release_ignored() {
        let pool = ResourcePool::new(2, 1, Slot::default).unwrap();
        let first = pool.alloc(1).unwrap();
        pool.free(first);
        pool.free(first);
        assert_eq!(pool.available(), 2);

        let a = pool.alloc(1).unwrap();
        let b = pool.alloc(1).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_alloc_recycles_run() {
        let pool = ResourcePool::new(4, 2, Slot::default).unwrap();
        let first = pool.alloc(1).unwrap();
        assert_eq!(pool.get(first).recycled.load(Ordering::Relaxed), 1);
        assert_eq!(pool.get(first + 1).recycled.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_mutex_slots_reset() {
        let pool: ResourcePool<Mutex<u32>> = ResourcePool::new(2, 1, || Mutex::new(7)).unwrap();
        let index = pool.alloc(1).unwrap();
        assert_eq!(*pool.get(index).lock(), 0);
    }

    #[test]
    #[should_panic]
    fn test_oversized_alloc_panics() {
        let pool = ResourcePool::new(4, 2, Slot::default).unwrap();
        let _ = pool.alloc(3);
    }

    #[test]
    #[should_panic]
    fn test_empty_alloc_panics() {
        let pool = ResourcePool::new(4, 2, Slot::default).unwrap();
        let _ = pool.alloc(0);
    }

    #[test]
    fn test_dma_pool_geometry() {
        let platform = Arc::new(HostPlatform::new());
        assert_eq!(
            DmaPool::new(platform.clone(), 12, 4, 1).err(),
            Some(Error::InvalidParameter)
        );
        assert_eq!(
            DmaPool::new(platform.clone(), 0, 4, 1).err(),
            Some(Error::InvalidParameter)
        );

        // 24-byte elements round to 32; 256 + 19 slots need 3 pages, so 4
        let pool = DmaPool::new(platform.clone(), 24, 256, 20).unwrap();
        assert_eq!(pool.element_size(), 32);
        assert_eq!(pool.count(), (4 * PAGE_SIZE / 32) as u32);
        assert_eq!(pool.available(), pool.count());
        assert_eq!(platform.coherent_count(), 1);

        pool.exit();
        assert_eq!(platform.coherent_count(), 0);
    }

    #[test]
    fn test_dma_slots() {
        let platform = Arc::new(HostPlatform::new());
        let pool = DmaPool::new(platform.clone(), 32, 2, 1).unwrap();

        let first = pool.alloc().unwrap();
        assert_eq!(first.offset, 0);
        assert_eq!(first.addr, pool.base());

        let second = pool.alloc().unwrap();
        assert_eq!(second.offset, 32);
        assert_eq!(second.addr, pool.base() + 32);

        pool.write(second, &[0xab; 4]);
        let mut out = [0u8; 4];
        assert!(platform.read_coherent(second.addr, &mut out));
        assert_eq!(out, [0xab; 4]);

        // Rewriting replaces the whole slot
        pool.write(second, &[0xcd; 2]);
        pool.read(second, &mut out);
        assert_eq!(out, [0xcd, 0xcd, 0, 0]);

        for _ in 2..pool.count() {
            pool.alloc().unwrap();
        }
        assert_eq!(pool.alloc().err(), Some(Error::Capacity));
    }

    #[test]
    fn test_dma_slot_reuse_skips_live() {
        let platform = Arc::new(HostPlatform::new());
        let pool = DmaPool::new(platform, 32, 2, 1).unwrap();
        let count = pool.count();

        let held = pool.alloc().unwrap();
        pool.write(held, &[0x5a; 8]);
        for _ in 0..2 * count {
            let slot = pool.alloc().unwrap();
            assert_ne!(slot.offset, held.offset);
            pool.free(slot);
        }

        let mut out = [0u8; 8];
        pool.read(held, &mut out);
        assert_eq!(out, [0x5a; 8]);

        // Freed slots come back zeroed
        pool.free(held);
        let mut reused = pool.alloc().unwrap();
        while reused.offset != held.offset {
            reused = pool.alloc().unwrap();
        }
        pool.read(reused, &mut out);
        assert_eq!(out, [0; 8]);
    }
}
