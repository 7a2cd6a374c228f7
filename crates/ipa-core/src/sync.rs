//! # Synchronization Primitives
//!
//! Completion signals and reference counts for transactions shared between
//! a submitter, the completion path and any waiter.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use static_assertions::assert_eq_size;

assert_eq_size!(RefCount, u32);

// =============================================================================
// COMPLETION
// =============================================================================

/// One-shot completion signal.
///
/// Completed once by the poller when a transaction finishes; observed by at
/// most one waiter. Waiting never holds a lock.
#[derive(Debug, Default)]
pub struct Completion {
    done: AtomicBool,
}

impl Completion {
    /// Create an unsignaled completion
    pub const fn new() -> Self {
        Self {
            done: AtomicBool::new(false),
        }
    }

    /// Rearm for reuse
    #[inline]
    pub fn reinit(&self) {
        self.done.store(false, Ordering::Release);
    }

    /// Signal completion
    #[inline]
    pub fn complete(&self) {
        self.done.store(true, Ordering::Release);
    }

    /// Check whether the completion has been signaled
    #[inline]
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Block until signaled
    pub fn wait(&self) {
        while !self.is_done() {
            relax();
        }
    }

    /// Block until signaled or until `timeout_ns` elapsed on the clock
    /// sampled by `now_ns`.
    ///
    /// Returns `true` if the completion was signaled in time.
    pub fn wait_timeout(&self, timeout_ns: u64, mut now_ns: impl FnMut() -> u64) -> bool {
        let deadline = now_ns().saturating_add(timeout_ns);
        loop {
            if self.is_done() {
                return true;
            }
            if now_ns() >= deadline {
                return self.is_done();
            }
            relax();
        }
    }
}

#[inline]
fn relax() {
    #[cfg(feature = "std")]
    std::thread::yield_now();
    #[cfg(not(feature = "std"))]
    core::hint::spin_loop();
}

// =============================================================================
// REFERENCE COUNT
// =============================================================================

/// Saturation-checked atomic reference count
#[derive(Debug, Default)]
pub struct RefCount(AtomicU32);

impl RefCount {
    /// Create with an initial count
    pub const fn new(count: u32) -> Self {
        Self(AtomicU32::new(count))
    }

    /// Reset the count (only valid while nobody else holds a reference)
    #[inline]
    pub fn set(&self, count: u32) {
        self.0.store(count, Ordering::Release);
    }

    /// Current count
    #[inline]
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }

    /// Take an additional reference
    #[inline]
    pub fn inc(&self) {
        let old = self.0.fetch_add(1, Ordering::AcqRel);
        debug_assert!(old != 0, "reference taken on a released object");
    }

    /// Drop a reference unless it is the last one.
    ///
    /// Returns `false` without modifying the count when only one
    /// reference remains.
    pub fn dec_not_one(&self) -> bool {
        let mut count = self.0.load(Ordering::Acquire);
        loop {
            if count == 1 {
                return false;
            }
            debug_assert!(count != 0, "reference dropped on a released object");
            match self.0.compare_exchange_weak(
                count,
                count - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => count = actual,
            }
        }
    }

    /// Drop a reference, returning `true` if it was the last one
    #[inline]
    pub fn dec_and_test(&self) -> bool {
        let old = self.0.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(old != 0, "reference dropped on a released object");
        old == 1
    }
}
