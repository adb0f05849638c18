//! Shared counters for a fixed set of concurrent tasks.
//!
//! Two flavours of the same contract: every increment is applied exactly
//! once, and the final total after `T` tasks each add `K` is `T * K`.
//!
//! | Type | Synchronization | Blocks? |
//! |------|-----------------|---------|
//! | [`LockedCounter`] | `Mutex<u64>` | only while acquiring the lock |
//! | [`AtomicCounter`] | `fetch_add(Relaxed)` | never |
//!
//! Neither counter is a global. Create one, wrap it in an [`Arc`](std::sync::Arc)
//! and hand a clone to every task that touches it.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//!
//! use strand_counter::{AtomicCounter, Counter, LockedCounter};
//!
//! fn hammer(counter: Arc<dyn Counter>) -> u64 {
//!     let handles: Vec<_> = (0..4)
//!         .map(|_| {
//!             let counter = Arc::clone(&counter);
//!             thread::spawn(move || {
//!                 for _ in 0..1_000 {
//!                     counter.increment();
//!                 }
//!             })
//!         })
//!         .collect();
//!
//!     for h in handles {
//!         h.join().unwrap();
//!     }
//!     counter.read()
//! }
//!
//! assert_eq!(hammer(Arc::new(LockedCounter::new())), 4_000);
//! assert_eq!(hammer(Arc::new(AtomicCounter::new())), 4_000);
//! ```
//!
//! # Memory Ordering
//!
//! [`AtomicCounter`] uses `Relaxed` for both the increment and the read.
//! That is enough for the totals to be exact: a read-modify-write on a single
//! location always sees the latest value in that location's modification
//! order. It is *not* enough to publish any other memory. Do not use a
//! counter value as a signal that some other write has become visible.
//!
//! ```text
//! Task A                         Task B
//! ──────────────────────         ──────────────────────
//! data = 42
//! counter.increment()  ───✗───►  counter.read() == 1
//!                                data == ?   (not guaranteed)
//! ```
//!
//! Reads are only guaranteed to be non-decreasing for a given instance.
//! Joining the writer tasks is what makes the final total visible.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod sync;

use core::fmt;

use crossbeam_utils::CachePadded;

use crate::sync::{AtomicU64, Mutex, Ordering};

/// Common interface over both counter flavours.
///
/// Lets the harness and benches drive either implementation through the
/// same workload.
pub trait Counter: Send + Sync {
    /// Adds exactly one to the total.
    fn increment(&self);

    /// Adds `n` to the total as a single indivisible step.
    fn add(&self, n: u64);

    /// Returns a snapshot of the total.
    fn read(&self) -> u64;
}

// ============================================================================
// LockedCounter
// ============================================================================

/// An integer total guarded by a mutual-exclusion lock.
///
/// The value only changes while the lock is held. `increment` blocks the
/// caller just long enough to acquire the lock; it has no failure path.
pub struct LockedCounter {
    value: Mutex<u64>,
}

impl LockedCounter {
    /// Creates a counter starting at zero.
    pub fn new() -> Self {
        Self {
            value: Mutex::new(0),
        }
    }

    /// Adds one under the lock. The lock is released before returning.
    #[inline]
    pub fn increment(&self) {
        *sync::lock(&self.value) += 1;
    }

    /// Adds `n` under the lock.
    #[inline]
    pub fn add(&self, n: u64) {
        *sync::lock(&self.value) += n;
    }

    /// Returns the current value.
    ///
    /// May run concurrently with `increment`; the result is consistent with
    /// some total order of the increments completed so far.
    #[inline]
    pub fn read(&self) -> u64 {
        *sync::lock(&self.value)
    }
}

impl Default for LockedCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl Counter for LockedCounter {
    fn increment(&self) {
        LockedCounter::increment(self);
    }

    fn add(&self, n: u64) {
        LockedCounter::add(self, n);
    }

    fn read(&self) -> u64 {
        LockedCounter::read(self)
    }
}

impl fmt::Debug for LockedCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockedCounter")
            .field("value", &self.read())
            .finish()
    }
}

// ============================================================================
// AtomicCounter
// ============================================================================

/// An integer total updated with a lock-free `fetch_add`.
///
/// Increments use `Relaxed` ordering: they are never lost or double counted,
/// but they do not order any other memory access around them. See the
/// [crate-level docs](crate#memory-ordering).
///
/// The atomic is cache-padded so that contended increments don't false-share
/// with whatever the caller allocates next to the counter.
pub struct AtomicCounter {
    value: CachePadded<AtomicU64>,
}

impl AtomicCounter {
    /// Creates a counter starting at zero.
    pub fn new() -> Self {
        Self {
            value: CachePadded::new(AtomicU64::new(0)),
        }
    }

    /// Indivisibly adds one.
    #[inline]
    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Indivisibly adds `n`.
    #[inline]
    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    /// Returns a relaxed snapshot of the total.
    ///
    /// Not guaranteed to include increments that another task completed
    /// "just now", only to never go backwards for this instance.
    #[inline]
    pub fn read(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for AtomicCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl Counter for AtomicCounter {
    fn increment(&self) {
        AtomicCounter::increment(self);
    }

    fn add(&self, n: u64) {
        AtomicCounter::add(self, n);
    }

    fn read(&self) -> u64 {
        AtomicCounter::read(self)
    }
}

impl fmt::Debug for AtomicCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomicCounter")
            .field("value", &self.read())
            .finish()
    }
}
