//! An unbounded multi-producer multi-consumer hand-off queue with blocking
//! drain and explicit shutdown.
//!
//! Producers [`enqueue`](HandoffQueue::enqueue) work items; consumers
//! [`drain_blocking`](HandoffQueue::drain_blocking) until they receive the
//! "no more work" signal (`None`). One producer (or the coordinator) calls
//! [`close`](HandoffQueue::close) once everything has been enqueued.
//!
//! # State Machine
//!
//! ```text
//!            close()                    last item dequeued
//!   Open ───────────────► Closing ─────────────────────────► Drained
//!     │                                                         ▲
//!     └─────────────── close() on an empty queue ───────────────┘
//! ```
//!
//! | State | `enqueue` | `drain_blocking` on empty |
//! |-------|-----------|---------------------------|
//! | Open | accepted | parks until enqueue or close |
//! | Closing | rejected with [`EnqueueError`] | n/a (never empty) |
//! | Drained | rejected with [`EnqueueError`] | returns `None` immediately |
//!
//! The state is an explicit tag ([`QueueState`]), not a loose `done` flag.
//!
//! # Why Nobody Parks Forever
//!
//! Two rules carry the whole correctness argument:
//!
//! ```text
//! Consumer:                              close():
//! ─────────────────────────────          ─────────────────────────────
//! lock
//! while empty && Open {                  lock
//!     wait(cond)   ◄── re-checked        state = Closing | Drained
//! }                    after EVERY wake  unlock
//! pop or None                            notify_all   ◄── not notify_one
//! ```
//!
//! 1. **Re-check after wake.** Condition variables wake spuriously, and a
//!    woken consumer may lose the race for the item to another consumer.
//!    The emptiness check is a loop, never an `if`.
//! 2. **Wake everyone on close.** Any number of consumers may be parked
//!    waiting for work that will never arrive. `notify_one` would release
//!    one of them and strand the rest.
//!
//! Enqueue and the emptiness check both happen under the same lock, so a
//! consumer can't check "empty", miss a concurrent push, and then park.
//!
//! # Spin Before Parking
//!
//! A consumer that finds the queue empty first re-checks a few times with
//! [`crossbeam_utils::Backoff::snooze`] before committing to a condition
//! variable wait. Bursty producers usually refill the queue within that
//! window, and the consumer avoids a futex round trip. The final wait still
//! goes through the locked re-check loop, so the spin phase is purely an
//! optimisation.
//!
//! ```
//! use strand_queue::{HandoffQueue, QueueConfig};
//!
//! // More spinning for bursty producers
//! let q = HandoffQueue::<u64>::with_config(QueueConfig { spin_iters: 32 });
//!
//! // Park immediately
//! let q = HandoffQueue::<u64>::with_config(QueueConfig { spin_iters: 0 });
//! ```
//!
//! # Ordering
//!
//! Items from a single producer come out in the order that producer enqueued
//! them. Items from different producers interleave arbitrarily; no global
//! order is promised.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//!
//! use strand_queue::HandoffQueue;
//!
//! let queue = Arc::new(HandoffQueue::<u64>::new());
//!
//! let producer = {
//!     let queue = Arc::clone(&queue);
//!     thread::spawn(move || {
//!         for i in 0..100 {
//!             queue.enqueue(i).unwrap();
//!         }
//!         queue.close().unwrap();
//!     })
//! };
//!
//! let consumer = {
//!     let queue = Arc::clone(&queue);
//!     thread::spawn(move || {
//!         let mut sum = 0;
//!         while let Some(item) = queue.drain_blocking() {
//!             sum += item;
//!         }
//!         sum
//!     })
//! };
//!
//! producer.join().unwrap();
//! assert_eq!(consumer.join().unwrap(), 4950);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod sync;

use core::fmt;
use std::collections::VecDeque;

use crossbeam_utils::Backoff;

use crate::sync::{Condvar, Mutex};

/// Default number of backoff snooze iterations before parking.
///
/// Each snooze uses `crossbeam_utils::Backoff::snooze()` which starts with
/// spinning and eventually yields to the OS scheduler.
pub const DEFAULT_SPIN_ITERS: usize = 8;

/// Lifecycle of a [`HandoffQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueState {
    /// Accepting enqueues.
    Open,
    /// Closed, but items are still waiting to be drained.
    Closing,
    /// Closed and empty. Every drain returns "no more work".
    Drained,
}

impl QueueState {
    /// Returns `true` once [`HandoffQueue::close`] has been called.
    #[inline]
    pub fn is_closed(self) -> bool {
        !matches!(self, QueueState::Open)
    }
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueueState::Open => "open",
            QueueState::Closing => "closing",
            QueueState::Drained => "drained",
        };
        f.write_str(s)
    }
}

/// Construction-time tuning for a [`HandoffQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Number of backoff rounds a consumer spends re-checking an empty queue
    /// before waiting on the condition variable. `0` parks immediately.
    pub spin_iters: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            spin_iters: DEFAULT_SPIN_ITERS,
        }
    }
}

/// Everything the lock protects.
struct Inner<T> {
    items: VecDeque<T>,
    state: QueueState,
}

impl<T> Inner<T> {
    /// Consumers must keep waiting while this holds.
    #[inline]
    fn must_wait(&self) -> bool {
        self.items.is_empty() && self.state == QueueState::Open
    }

    /// Pops the front item, retagging Closing -> Drained when it empties.
    fn pop(&mut self) -> Option<T> {
        let item = self.items.pop_front();
        self.settle();
        item
    }

    /// Moves every queued item into `buf`.
    fn pop_all(&mut self, buf: &mut Vec<T>) -> usize {
        let n = self.items.len();
        buf.extend(self.items.drain(..));
        self.settle();
        n
    }

    #[inline]
    fn settle(&mut self) {
        if self.items.is_empty() && self.state == QueueState::Closing {
            self.state = QueueState::Drained;
            tracing::trace!("handoff queue drained");
        }
    }
}

/// An unbounded FIFO hand-off buffer coordinated by a lock and a condition
/// variable.
///
/// Share it between tasks with an [`Arc`](std::sync::Arc). Any number of
/// producers and consumers may use the same queue concurrently.
///
/// # Example
///
/// ```
/// use strand_queue::{HandoffQueue, QueueState};
///
/// let q = HandoffQueue::new();
///
/// q.enqueue(1).unwrap();
/// q.enqueue(2).unwrap();
/// q.close().unwrap();
/// assert_eq!(q.state(), QueueState::Closing);
///
/// // Items enqueued before close are still delivered
/// assert_eq!(q.drain_blocking(), Some(1));
/// assert_eq!(q.drain_blocking(), Some(2));
///
/// // Then "no more work"
/// assert_eq!(q.drain_blocking(), None);
/// assert_eq!(q.state(), QueueState::Drained);
/// ```
pub struct HandoffQueue<T> {
    inner: Mutex<Inner<T>>,
    available: Condvar,
    spin_iters: usize,
}

impl<T> HandoffQueue<T> {
    /// Creates an empty, open queue with default spin settings.
    ///
    /// Uses [`DEFAULT_SPIN_ITERS`] snooze rounds before parking. For custom
    /// tuning, use [`with_config`](Self::with_config).
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    /// Creates an empty, open queue with the given configuration.
    ///
    /// # Example
    ///
    /// ```
    /// use strand_queue::{HandoffQueue, QueueConfig};
    ///
    /// let q = HandoffQueue::<String>::with_config(QueueConfig { spin_iters: 2 });
    /// assert!(q.is_empty());
    /// ```
    pub fn with_config(config: QueueConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                state: QueueState::Open,
            }),
            available: Condvar::new(),
            spin_iters: config.spin_iters,
        }
    }

    /// Appends `item` and wakes one waiting consumer.
    ///
    /// Never blocks on capacity; only on the internal lock.
    ///
    /// # Errors
    ///
    /// Returns `Err(EnqueueError(item))` if the queue has been closed. The
    /// item is handed back rather than silently dropped.
    ///
    /// # Example
    ///
    /// ```
    /// use strand_queue::HandoffQueue;
    ///
    /// let q = HandoffQueue::new();
    /// assert!(q.enqueue(1).is_ok());
    ///
    /// q.close().unwrap();
    /// let err = q.enqueue(2).unwrap_err();
    /// assert_eq!(err.into_inner(), 2);
    /// ```
    pub fn enqueue(&self, item: T) -> Result<(), EnqueueError<T>> {
        {
            let mut inner = sync::lock(&self.inner);
            if inner.state.is_closed() {
                return Err(EnqueueError(item));
            }
            inner.items.push_back(item);
        }
        self.available.notify_one();
        Ok(())
    }

    /// Marks the queue as finished and wakes **every** waiting consumer.
    ///
    /// Items already enqueued are still delivered. Once they run out, every
    /// current and future [`drain_blocking`](Self::drain_blocking) returns
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns `Err(CloseError)` if the queue was already closed. The
    /// Open → Closing transition happens exactly once.
    pub fn close(&self) -> Result<(), CloseError> {
        {
            let mut inner = sync::lock(&self.inner);
            if inner.state.is_closed() {
                return Err(CloseError);
            }
            inner.state = if inner.items.is_empty() {
                QueueState::Drained
            } else {
                QueueState::Closing
            };
            tracing::trace!(
                state = %inner.state,
                pending = inner.items.len(),
                "handoff queue closed"
            );
        }
        self.available.notify_all();
        Ok(())
    }

    /// Removes the front item, blocking while the queue is empty and open.
    ///
    /// If the queue is empty, this method will:
    /// 1. Re-check with backoff (spin phase, see [`QueueConfig`])
    /// 2. Wait on the condition variable, re-checking after every wake
    ///
    /// Returns `Some(item)` when one is available, or `None` once the queue
    /// is closed and empty ("no more work"). `None` is never a real item.
    pub fn drain_blocking(&self) -> Option<T> {
        if let Some(ready) = self.spin() {
            return ready;
        }

        let mut inner = sync::lock(&self.inner);
        while inner.must_wait() {
            inner = sync::wait(&self.available, inner);
        }
        inner.pop()
    }

    /// Blocks like [`drain_blocking`](Self::drain_blocking) (spin phase
    /// included), then moves every queued item into `buf` under a single lock
    /// acquisition.
    ///
    /// Returns the number of items appended. `0` means the queue is closed
    /// and empty; it is never returned while the queue is open.
    ///
    /// # Example
    ///
    /// ```
    /// use strand_queue::HandoffQueue;
    ///
    /// let q = HandoffQueue::new();
    /// for i in 0..5 {
    ///     q.enqueue(i).unwrap();
    /// }
    /// q.close().unwrap();
    ///
    /// let mut buf = Vec::new();
    /// assert_eq!(q.drain_available_blocking(&mut buf), 5);
    /// assert_eq!(buf, vec![0, 1, 2, 3, 4]);
    /// assert_eq!(q.drain_available_blocking(&mut buf), 0);
    /// ```
    pub fn drain_available_blocking(&self, buf: &mut Vec<T>) -> usize {
        self.spin_until_ready();

        let mut inner = sync::lock(&self.inner);
        while inner.must_wait() {
            inner = sync::wait(&self.available, inner);
        }
        inner.pop_all(buf)
    }

    /// Attempts to remove the front item without blocking.
    ///
    /// Returns immediately with:
    /// - `Ok(item)` if an item was available
    /// - `Err(TryDequeueError::Empty)` if the queue is empty but still open
    /// - `Err(TryDequeueError::Drained)` if the queue is closed and empty
    ///
    /// # Example
    ///
    /// ```
    /// use strand_queue::{HandoffQueue, TryDequeueError};
    ///
    /// let q = HandoffQueue::new();
    /// assert_eq!(q.try_dequeue(), Err(TryDequeueError::Empty));
    ///
    /// q.enqueue(7).unwrap();
    /// assert_eq!(q.try_dequeue(), Ok(7));
    ///
    /// q.close().unwrap();
    /// assert_eq!(q.try_dequeue(), Err(TryDequeueError::Drained));
    /// ```
    pub fn try_dequeue(&self) -> Result<T, TryDequeueError> {
        let mut inner = sync::lock(&self.inner);
        match inner.pop() {
            Some(item) => Ok(item),
            None if inner.state.is_closed() => Err(TryDequeueError::Drained),
            None => Err(TryDequeueError::Empty),
        }
    }

    /// Returns a blocking iterator that yields items until the queue is
    /// closed and empty.
    ///
    /// # Example
    ///
    /// ```
    /// use strand_queue::HandoffQueue;
    ///
    /// let q = HandoffQueue::new();
    /// q.enqueue(1).unwrap();
    /// q.enqueue(2).unwrap();
    /// q.close().unwrap();
    ///
    /// assert_eq!(q.iter().sum::<i32>(), 3);
    /// ```
    #[inline]
    pub fn iter(&self) -> Iter<'_, T> {
        Iter { queue: self }
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> QueueState {
        sync::lock(&self.inner).state
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.state().is_closed()
    }

    /// Returns the number of queued items.
    ///
    /// Only a snapshot: other tasks may change it immediately.
    pub fn len(&self) -> usize {
        sync::lock(&self.inner).items.len()
    }

    /// Returns `true` if no items are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spin phase of a blocking drain.
    ///
    /// `Some(ready)` short-circuits the drain; `None` means fall through to
    /// the condition variable.
    fn spin(&self) -> Option<Option<T>> {
        if self.spin_iters == 0 {
            return None;
        }

        let backoff = Backoff::new();
        for _ in 0..self.spin_iters {
            match self.try_dequeue() {
                Ok(item) => return Some(Some(item)),
                Err(TryDequeueError::Drained) => return Some(None),
                Err(TryDequeueError::Empty) => backoff.snooze(),
            }
        }
        None
    }

    /// Spin phase of a batch drain. Leaves every item in place so the
    /// caller takes the whole batch under one lock.
    fn spin_until_ready(&self) {
        let backoff = Backoff::new();
        for _ in 0..self.spin_iters {
            if !sync::lock(&self.inner).must_wait() {
                return;
            }
            backoff.snooze();
        }
    }
}

impl<T> Default for HandoffQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for HandoffQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = sync::lock(&self.inner);
        f.debug_struct("HandoffQueue")
            .field("len", &inner.items.len())
            .field("state", &inner.state)
            .field("spin_iters", &self.spin_iters)
            .finish_non_exhaustive()
    }
}

/// Blocking iterator over a [`HandoffQueue`], see [`HandoffQueue::iter`].
pub struct Iter<'a, T> {
    queue: &'a HandoffQueue<T>,
}

impl<T> Iterator for Iter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.queue.drain_blocking()
    }
}

impl<'a, T> IntoIterator for &'a HandoffQueue<T> {
    type Item = T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

impl<T> fmt::Debug for Iter<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter").finish_non_exhaustive()
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error returned when [`HandoffQueue::enqueue`] is called after close.
///
/// Contains the item that could not be enqueued, allowing recovery of the
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueueError<T>(pub T);

impl<T> EnqueueError<T> {
    /// Returns the item that could not be enqueued.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Display for EnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "enqueue on a closed handoff queue")
    }
}

impl<T: fmt::Debug> std::error::Error for EnqueueError<T> {}

/// Error returned when [`HandoffQueue::close`] is called a second time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseError;

impl fmt::Display for CloseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handoff queue already closed")
    }
}

impl std::error::Error for CloseError {}

/// Error returned by [`HandoffQueue::try_dequeue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryDequeueError {
    /// The queue is empty but still open; more items may arrive.
    Empty,

    /// The queue is closed and empty; no more items will arrive.
    Drained,
}

impl TryDequeueError {
    /// Returns `true` if this error is the `Empty` variant.
    pub fn is_empty(&self) -> bool {
        matches!(self, TryDequeueError::Empty)
    }

    /// Returns `true` if this error is the `Drained` variant.
    pub fn is_drained(&self) -> bool {
        matches!(self, TryDequeueError::Drained)
    }
}

impl fmt::Display for TryDequeueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryDequeueError::Empty => write!(f, "handoff queue empty"),
            TryDequeueError::Drained => write!(f, "handoff queue drained"),
        }
    }
}

impl std::error::Error for TryDequeueError {}
