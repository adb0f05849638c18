//! Harness error type.

use strand_oneshot::RecvError;
use strand_queue::{CloseError, EnqueueError};

/// Everything that can stop an experiment from producing a report.
///
/// A *failed* experiment (wrong total) is not an error: it still produces a
/// [`Report`](crate::Report) whose `passed()` is false.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// The OS refused to start a thread.
    #[error("failed to spawn task `{name}`")]
    Spawn {
        /// Task name.
        name: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// A task panicked before finishing its body.
    #[error("task `{name}` panicked")]
    TaskPanicked {
        /// Task name.
        name: String,
    },

    /// A workload size makes the experiment meaningless.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// A producer enqueued after close.
    #[error(transparent)]
    Enqueue(#[from] EnqueueError<u64>),

    /// The hand-off queue was closed twice.
    #[error(transparent)]
    Close(#[from] CloseError),

    /// A one-shot value could not be delivered.
    #[error("oneshot fulfill failed: {0}")]
    Fulfill(String),

    /// The producing side of a one-shot channel went away.
    #[error(transparent)]
    Recv(#[from] RecvError),
}
