//! Spawn / await: the only scheduling capability the primitives rely on.
//!
//! Tasks are OS threads. The primitives assume nothing beyond "tasks run
//! concurrently with each other and with the spawner, and `join` doesn't
//! return until the body (and all its effects) has finished".

use std::thread;

use strand_oneshot::Receiver;

use crate::HarnessError;

/// Starts task bodies.
pub trait Spawner {
    /// Starts `body` as a new task named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Spawn`] if the task could not be started.
    fn spawn<F, R>(&self, name: &str, body: F) -> Result<TaskHandle<R>, HarnessError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static;
}

/// Handle to a running task. [`join`](TaskHandle::join) is the "await".
#[derive(Debug)]
pub struct TaskHandle<R> {
    name: String,
    inner: thread::JoinHandle<R>,
}

impl<R> TaskHandle<R> {
    /// Returns the task's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Blocks until the task has finished and returns its result.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::TaskPanicked`] if the body panicked.
    pub fn join(self) -> Result<R, HarnessError> {
        let Self { name, inner } = self;
        match inner.join() {
            Ok(value) => {
                tracing::trace!(task = %name, "joined");
                Ok(value)
            }
            Err(_) => {
                tracing::warn!(task = %name, "task panicked");
                Err(HarnessError::TaskPanicked { name })
            }
        }
    }
}

/// Spawns each task on its own named OS thread.
#[derive(Debug, Clone, Default)]
pub struct ThreadSpawner {
    stack_size: Option<usize>,
}

impl ThreadSpawner {
    /// Creates a spawner using the platform's default stack size.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the stack size for every spawned thread.
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }
}

impl Spawner for ThreadSpawner {
    fn spawn<F, R>(&self, name: &str, body: F) -> Result<TaskHandle<R>, HarnessError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let mut builder = thread::Builder::new().name(name.to_string());
        if let Some(bytes) = self.stack_size {
            builder = builder.stack_size(bytes);
        }

        let inner = builder.spawn(body).map_err(|source| HarnessError::Spawn {
            name: name.to_string(),
            source,
        })?;
        tracing::debug!(task = name, "spawned");

        Ok(TaskHandle {
            name: name.to_string(),
            inner,
        })
    }
}

/// Runs `body` as a one-off task and delivers its result through a one-shot
/// channel.
///
/// If the body panics, the sender is dropped unfulfilled and the receiver
/// reports [`RecvError::Abandoned`](strand_oneshot::RecvError::Abandoned).
/// The returned handle should still be joined.
///
/// # Errors
///
/// Returns [`HarnessError::Spawn`] if the task could not be started.
pub fn spawn_with_result<S, F, R>(
    spawner: &S,
    name: &str,
    body: F,
) -> Result<(Receiver<R>, TaskHandle<()>), HarnessError>
where
    S: Spawner,
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let (tx, rx) = strand_oneshot::channel();
    let handle = spawner.spawn(name, move || {
        let value = body();
        if let Err(err) = tx.fulfill(value) {
            tracing::debug!(%err, "result not delivered");
        }
    })?;
    Ok((rx, handle))
}
