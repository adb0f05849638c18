//! Task-local cells.
//!
//! A [`LocalCell`] is an ordinary value you create, share by reference (or
//! `Arc`) and pass to every task. Each task that touches it gets its own
//! slot, lazily initialised with `T::default()` on first access. A task
//! never observes another task's slot, even though they all hold the "same"
//! cell.
//!
//! ```text
//!                    LocalCell { id: 7 }
//!                  ┌─────────┼─────────┐
//!                  ▼         ▼         ▼
//!   thread A:  slots[7] = 100
//!   thread B:            slots[7] = 200
//!   main:                          slots[7] = 0 (default, on first get)
//! ```
//!
//! Tasks are OS threads here, so the per-task storage is a `thread_local!`
//! map keyed by cell id. No locks are involved: only the owning thread ever
//! touches its map.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//!
//! use strand_local::LocalCell;
//!
//! let cell = Arc::new(LocalCell::<u32>::new());
//!
//! let handles: Vec<_> = [100, 200]
//!     .into_iter()
//!     .map(|v| {
//!         let cell = Arc::clone(&cell);
//!         thread::spawn(move || {
//!             cell.set(v);
//!             cell.get()
//!         })
//!     })
//!     .collect();
//!
//! let seen: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
//! assert_eq!(seen, vec![100, 200]);
//!
//! // The spawning thread never wrote, so it sees the default
//! assert_eq!(cell.get(), 0);
//! ```
//!
//! # Lifetime of Slots
//!
//! A slot lives until its thread exits. Dropping the cell frees the slot of
//! the dropping thread immediately; slots on other threads are freed when
//! those threads exit.

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of cell ids. Ids are never reused.
static NEXT_ID: AtomicU64 = AtomicU64::new(0);

thread_local! {
    /// This thread's slots, keyed by cell id. Each value is an `Rc<RefCell<T>>`.
    static SLOTS: RefCell<HashMap<u64, Rc<dyn Any>>> = RefCell::new(HashMap::new());
}

/// A storage slot whose value is maintained independently per thread.
///
/// `LocalCell` is `Send + Sync` for any `T`: values never cross threads,
/// only the cell's identity does.
pub struct LocalCell<T: 'static> {
    id: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Default + 'static> LocalCell<T> {
    /// Creates a new cell. No slot exists anywhere until first access.
    pub fn new() -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            _marker: PhantomData,
        }
    }

    /// Returns a copy of the calling thread's value.
    ///
    /// Creates the slot with `T::default()` if this thread hasn't touched the
    /// cell yet.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Overwrites the calling thread's value.
    pub fn set(&self, value: T) {
        self.update(|slot| *slot = value);
    }

    /// Overwrites the calling thread's value, returning the previous one.
    pub fn replace(&self, value: T) -> T {
        self.update(|slot| std::mem::replace(slot, value))
    }

    /// Calls `f` with a reference to the calling thread's value.
    ///
    /// # Panics
    ///
    /// Panics if `f` re-enters [`update`](Self::update) (or `set` /
    /// `replace`) on this same cell.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let slot = self.slot();
        let value = slot.borrow();
        f(&value)
    }

    /// Calls `f` with a mutable reference to the calling thread's value.
    ///
    /// # Panics
    ///
    /// Panics if `f` re-enters this same cell.
    ///
    /// # Example
    ///
    /// ```
    /// use strand_local::LocalCell;
    ///
    /// let hits = LocalCell::<u64>::new();
    /// for _ in 0..3 {
    ///     hits.update(|n| *n += 1);
    /// }
    /// assert_eq!(hits.get(), 3);
    /// ```
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let slot = self.slot();
        let mut value = slot.borrow_mut();
        f(&mut value)
    }

    /// Returns `true` if the calling thread already has a slot for this
    /// cell.
    pub fn is_initialized(&self) -> bool {
        SLOTS
            .try_with(|slots| slots.borrow().contains_key(&self.id))
            .unwrap_or(false)
    }

    /// Fetches (or lazily creates) this thread's slot.
    ///
    /// The map is never borrowed while user code runs: `T::default()` is
    /// built between two short borrows, and closures passed to `with` /
    /// `update` run after the borrow is released. Any of them may freely use
    /// *other* cells.
    fn slot(&self) -> Rc<RefCell<T>> {
        let existing = SLOTS.with(|slots| slots.borrow().get(&self.id).map(Rc::clone));

        let any = match existing {
            Some(slot) => slot,
            None => {
                let fresh: Rc<dyn Any> = Rc::new(RefCell::new(T::default()));
                // T::default() may have touched this cell and created the slot
                SLOTS.with(|slots| {
                    Rc::clone(slots.borrow_mut().entry(self.id).or_insert(fresh))
                })
            }
        };

        let Ok(slot) = any.downcast::<RefCell<T>>() else {
            unreachable!("local cell {} reused with a different type", self.id);
        };
        slot
    }
}

impl<T: Default + 'static> Default for LocalCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Drop for LocalCell<T> {
    fn drop(&mut self) {
        // The thread may be tearing down its locals already.
        let removed = SLOTS
            .try_with(|slots| {
                slots
                    .try_borrow_mut()
                    .ok()
                    .and_then(|mut slots| slots.remove(&self.id))
            })
            .ok()
            .flatten();
        // Dropped outside the borrow: T::drop may use other cells.
        drop(removed);
    }
}

impl<T: 'static> fmt::Debug for LocalCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalCell")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
