//! Single-use promise/future channel.
//!
//! Delivers exactly one value from exactly one [`Sender`] to exactly one
//! [`Receiver`]:
//! - The sender [`fulfill`](Sender::fulfill)s once; a second attempt is a
//!   contract violation and is rejected
//! - The receiver [`await_value`](Receiver::await_value)s, blocking until the
//!   value arrives
//! - If the sender is dropped without fulfilling, the receiver wakes with
//!   [`RecvError::Abandoned`] instead of hanging
//!
//! # Lifecycle
//!
//! ```text
//!                fulfill(v)                  await_value() / try_recv()
//!   Empty ─────────────────────► Fulfilled ──────────────────────────► Taken
//!     │
//!     │ Sender dropped
//!     ▼
//!   Abandoned ──► await_value() returns Err(RecvError::Abandoned)
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::thread;
//!
//! let (tx, rx) = strand_oneshot::channel::<String>();
//!
//! let t = thread::spawn(move || {
//!     tx.fulfill("Hello from promise!".to_string()).unwrap();
//! });
//!
//! assert_eq!(rx.await_value().unwrap(), "Hello from promise!");
//! t.join().unwrap();
//! ```
//!
//! # Abandonment
//!
//! ```rust
//! use strand_oneshot::RecvError;
//!
//! let (tx, rx) = strand_oneshot::channel::<u64>();
//! drop(tx);
//!
//! assert_eq!(rx.await_value(), Err(RecvError::Abandoned));
//! ```
//!
//! # Wakeups
//!
//! The receiver owns a [`crossbeam_utils::sync::Parker`]; the sender holds
//! the matching `Unparker`. Unpark leaves a token behind, so a wakeup sent
//! before the receiver parks is not lost:
//!
//! ```text
//! Receiver:                        Sender:
//! ─────────────────────            ─────────────────────
//! lock, state == Empty
//! unlock
//!                                  lock, state = Fulfilled(v)
//!                                  unlock
//!                                  unpark()   -> token set
//! park()  -> consumes token, returns
//! lock, state == Fulfilled -> take
//! ```
//!
//! The state is always re-read after `park` returns, so spurious wakeups
//! are harmless.

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossbeam_utils::sync::{Parker, Unparker};

/// Slot contents.
enum State<T> {
    /// Not fulfilled yet, sender still alive.
    Empty,
    /// Value delivered, not yet taken.
    Fulfilled(T),
    /// Value handed to the receiver.
    Taken,
    /// Sender dropped without fulfilling.
    Abandoned,
}

/// Shared state between sender and receiver.
struct Inner<T> {
    state: Mutex<State<T>>,
}

impl<T> Inner<T> {
    /// Critical sections only retag `state`, so a poisoned lock still
    /// guards a consistent value.
    #[inline]
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The producing half of a one-shot channel.
///
/// Not `Clone`: there is exactly one producer per channel. Dropping it
/// before calling [`fulfill`](Sender::fulfill) abandons the channel.
pub struct Sender<T> {
    inner: Arc<Inner<T>>,
    receiver_unparker: Unparker,
}

/// The consuming half of a one-shot channel.
pub struct Receiver<T> {
    inner: Arc<Inner<T>>,
    parker: Parker,
}

/// Creates a new one-shot channel.
///
/// Returns a `(Sender, Receiver)` pair.
pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    let inner = Arc::new(Inner {
        state: Mutex::new(State::Empty),
    });

    let parker = Parker::new();
    let receiver_unparker = parker.unparker().clone();

    (
        Sender {
            inner: Arc::clone(&inner),
            receiver_unparker,
        },
        Receiver { inner, parker },
    )
}

impl<T> Sender<T> {
    /// Delivers `value` to the receiver and wakes it.
    ///
    /// # Errors
    ///
    /// - `Err(FulfillError::AlreadyFulfilled(value))` if this channel was
    ///   already fulfilled. A one-shot channel can't represent "which value
    ///   wins", so this is a caller bug.
    /// - `Err(FulfillError::Disconnected(value))` if the receiver has been
    ///   dropped.
    ///
    /// In both cases the value is handed back.
    ///
    /// # Example
    ///
    /// ```
    /// use strand_oneshot::FulfillError;
    ///
    /// let (tx, rx) = strand_oneshot::channel();
    ///
    /// assert!(tx.fulfill(1).is_ok());
    /// assert_eq!(tx.fulfill(2), Err(FulfillError::AlreadyFulfilled(2)));
    ///
    /// assert_eq!(rx.await_value(), Ok(1));
    /// ```
    pub fn fulfill(&self, value: T) -> Result<(), FulfillError<T>> {
        {
            let mut state = self.inner.lock();
            match *state {
                State::Empty => {}
                State::Fulfilled(_) | State::Taken => {
                    return Err(FulfillError::AlreadyFulfilled(value));
                }
                // Only set by our own Drop.
                State::Abandoned => return Err(FulfillError::Disconnected(value)),
            }

            if self.is_disconnected() {
                return Err(FulfillError::Disconnected(value));
            }

            *state = State::Fulfilled(value);
        }

        self.receiver_unparker.unpark();
        Ok(())
    }

    /// Returns `true` if the receiver has been dropped.
    #[inline]
    pub fn is_disconnected(&self) -> bool {
        Arc::strong_count(&self.inner) == 1
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        let abandoned = {
            let mut state = self.inner.lock();
            if matches!(*state, State::Empty) {
                *state = State::Abandoned;
                true
            } else {
                false
            }
        };

        if abandoned {
            tracing::trace!("oneshot sender dropped without fulfilling");
            self.receiver_unparker.unpark();
        }
    }
}

impl<T> fmt::Debug for Sender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender")
            .field("disconnected", &self.is_disconnected())
            .finish_non_exhaustive()
    }
}

impl<T> Receiver<T> {
    /// Blocks until the value is delivered, then returns it.
    ///
    /// Consumes the receiver: the value is observed exactly once.
    ///
    /// # Errors
    ///
    /// - `Err(RecvError::Abandoned)` if the sender was dropped without
    ///   fulfilling
    /// - `Err(RecvError::Consumed)` if the value was already taken with
    ///   [`try_recv`](Self::try_recv)
    ///
    /// # Example
    ///
    /// ```
    /// use std::thread;
    ///
    /// let (tx, rx) = strand_oneshot::channel::<u64>();
    ///
    /// thread::spawn(move || {
    ///     tx.fulfill((1..=100).sum()).unwrap();
    /// });
    ///
    /// assert_eq!(rx.await_value().unwrap(), 5050);
    /// ```
    pub fn await_value(self) -> Result<T, RecvError> {
        loop {
            match self.take() {
                Ok(value) => return Ok(value),
                Err(TryRecvError::Empty) => self.parker.park(),
                Err(TryRecvError::Abandoned) => return Err(RecvError::Abandoned),
                Err(TryRecvError::Consumed) => return Err(RecvError::Consumed),
            }
        }
    }

    /// Takes the value if it has been delivered, without blocking.
    ///
    /// Returns immediately with:
    /// - `Ok(value)` if the value was available
    /// - `Err(TryRecvError::Empty)` if the sender hasn't fulfilled yet
    /// - `Err(TryRecvError::Abandoned)` if the sender was dropped unfulfilled
    /// - `Err(TryRecvError::Consumed)` if the value was already taken
    ///
    /// # Example
    ///
    /// ```
    /// use strand_oneshot::TryRecvError;
    ///
    /// let (tx, mut rx) = strand_oneshot::channel();
    /// assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    ///
    /// tx.fulfill(3).unwrap();
    /// assert_eq!(rx.try_recv(), Ok(3));
    /// assert_eq!(rx.try_recv(), Err(TryRecvError::Consumed));
    /// ```
    pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
        self.take()
    }

    /// Returns `true` if the value has been delivered and not yet taken.
    pub fn is_ready(&self) -> bool {
        matches!(*self.inner.lock(), State::Fulfilled(_))
    }

    /// Returns `true` if the sender was dropped without fulfilling.
    pub fn is_abandoned(&self) -> bool {
        matches!(*self.inner.lock(), State::Abandoned)
    }

    fn take(&self) -> Result<T, TryRecvError> {
        let mut state = self.inner.lock();
        match mem::replace(&mut *state, State::Taken) {
            State::Fulfilled(value) => Ok(value),
            State::Taken => Err(TryRecvError::Consumed),
            State::Empty => {
                *state = State::Empty;
                Err(TryRecvError::Empty)
            }
            State::Abandoned => {
                *state = State::Abandoned;
                Err(TryRecvError::Abandoned)
            }
        }
    }
}

impl<T> fmt::Debug for Receiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("ready", &self.is_ready())
            .field("abandoned", &self.is_abandoned())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error returned by [`Sender::fulfill`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FulfillError<T> {
    /// The channel was already fulfilled. Contract violation.
    ///
    /// The rejected value is returned.
    AlreadyFulfilled(T),

    /// The receiver has been dropped.
    ///
    /// The value is returned for cleanup.
    Disconnected(T),
}

impl<T> FulfillError<T> {
    /// Returns the value that could not be delivered.
    pub fn into_inner(self) -> T {
        match self {
            FulfillError::AlreadyFulfilled(v) | FulfillError::Disconnected(v) => v,
        }
    }

    /// Returns `true` if this error is the `AlreadyFulfilled` variant.
    pub fn is_already_fulfilled(&self) -> bool {
        matches!(self, FulfillError::AlreadyFulfilled(_))
    }

    /// Returns `true` if this error is the `Disconnected` variant.
    pub fn is_disconnected(&self) -> bool {
        matches!(self, FulfillError::Disconnected(_))
    }
}

impl<T> fmt::Display for FulfillError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FulfillError::AlreadyFulfilled(_) => write!(f, "oneshot channel already fulfilled"),
            FulfillError::Disconnected(_) => write!(f, "oneshot receiver dropped"),
        }
    }
}

impl<T: fmt::Debug> std::error::Error for FulfillError<T> {}

/// Error returned by [`Receiver::await_value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvError {
    /// The sender was dropped without fulfilling.
    Abandoned,

    /// The value was already taken through [`Receiver::try_recv`].
    Consumed,
}

impl fmt::Display for RecvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecvError::Abandoned => write!(f, "oneshot channel abandoned"),
            RecvError::Consumed => write!(f, "oneshot value already consumed"),
        }
    }
}

impl std::error::Error for RecvError {}

/// Error returned by [`Receiver::try_recv`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryRecvError {
    /// The sender hasn't fulfilled yet.
    Empty,

    /// The sender was dropped without fulfilling.
    Abandoned,

    /// The value was already taken.
    Consumed,
}

impl fmt::Display for TryRecvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryRecvError::Empty => write!(f, "oneshot channel empty"),
            TryRecvError::Abandoned => write!(f, "oneshot channel abandoned"),
            TryRecvError::Consumed => write!(f, "oneshot value already consumed"),
        }
    }
}

impl std::error::Error for TryRecvError {}
