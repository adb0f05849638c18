//! The experiments: each wires tasks to one primitive, awaits them, and
//! compares what it observed with what a correct implementation produces.
//!
//! | Experiment       | Workload                                     | Expected                        |
//! |------------------|----------------------------------------------|---------------------------------|
//! | `locked-counter` | `tasks` x `per_task` increments              | `tasks * per_task`              |
//! | `atomic-counter` | same, relaxed atomic                         | `tasks * per_task`              |
//! | `handoff`        | producers enqueue `0..items`, consumers drain | `P * C * (C-1) / 2`            |
//! | `async-sum`      | one-off task sums `1..=100`                  | `5050`                          |
//! | `promise`        | one-off task fulfils a string                | [`PROMISE_MESSAGE`]             |
//! | `task-local`     | two tasks write 100 and 200                  | own value each, spawner sees 0  |
//! | `timed-loop`     | `loop_iters` iterations                      | nothing, timing only            |

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Instant;

use strand_counter::{AtomicCounter, Counter, LockedCounter};
use strand_local::LocalCell;
use strand_queue::{HandoffQueue, QueueConfig};

use crate::config::handoff_expected_sum;
use crate::{spawn_with_result, HarnessConfig, HarnessError, Report, Spawner, TaskHandle};

/// Message delivered by the `promise` experiment.
pub const PROMISE_MESSAGE: &str = "Hello from promise!";

/// Which experiment to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Experiment {
    /// Mutex-guarded counter under contention.
    LockedCounter,
    /// Relaxed atomic counter under contention.
    AtomicCounter,
    /// Producers and consumers sharing a hand-off queue.
    Handoff,
    /// Async computation delivered through a one-shot channel.
    AsyncSum,
    /// Explicit promise/future pair.
    Promise,
    /// Per-task storage isolation.
    TaskLocal,
    /// Elapsed time of a plain loop.
    TimedLoop,
}

impl Experiment {
    /// Every experiment, in the order they are reported.
    pub const ALL: [Experiment; 7] = [
        Experiment::LockedCounter,
        Experiment::AtomicCounter,
        Experiment::Handoff,
        Experiment::AsyncSum,
        Experiment::Promise,
        Experiment::TaskLocal,
        Experiment::TimedLoop,
    ];

    /// Name used on the command line and in reports.
    pub fn name(self) -> &'static str {
        match self {
            Experiment::LockedCounter => "locked-counter",
            Experiment::AtomicCounter => "atomic-counter",
            Experiment::Handoff => "handoff",
            Experiment::AsyncSum => "async-sum",
            Experiment::Promise => "promise",
            Experiment::TaskLocal => "task-local",
            Experiment::TimedLoop => "timed-loop",
        }
    }

    /// Runs this experiment.
    ///
    /// # Errors
    ///
    /// Returns an error if a task could not be spawned, panicked, or a
    /// primitive reported a contract violation. A wrong result is *not* an
    /// error; it shows up as a failing [`Report`].
    pub fn run<S: Spawner>(
        self,
        spawner: &S,
        config: &HarnessConfig,
    ) -> Result<Report, HarnessError> {
        match self {
            Experiment::LockedCounter => {
                count_with(spawner, config, self, Arc::new(LockedCounter::new()))
            }
            Experiment::AtomicCounter => {
                count_with(spawner, config, self, Arc::new(AtomicCounter::new()))
            }
            Experiment::Handoff => handoff(spawner, config),
            Experiment::AsyncSum => async_sum(spawner),
            Experiment::Promise => promise(spawner),
            Experiment::TaskLocal => task_local(spawner),
            Experiment::TimedLoop => Ok(timed_loop(config.loop_iters)),
        }
    }
}

impl fmt::Display for Experiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Validates `config`, then runs `experiments` in order.
///
/// Stops at the first experiment that errors. Experiments that merely
/// observe a wrong result still produce a report and the run continues.
///
/// # Errors
///
/// Returns [`HarnessError::InvalidConfig`] before running anything if the
/// configuration is rejected, or the first experiment error.
pub fn run<S: Spawner>(
    spawner: &S,
    config: &HarnessConfig,
    experiments: &[Experiment],
) -> Result<Vec<Report>, HarnessError> {
    config.validate()?;

    let mut reports = Vec::with_capacity(experiments.len());
    for &experiment in experiments {
        let span = tracing::info_span!("experiment", name = experiment.name());
        let _enter = span.enter();

        let report = experiment.run(spawner, config)?;
        if report.passed() {
            tracing::info!(observed = %report.observed, elapsed = ?report.elapsed, "passed");
        } else {
            tracing::warn!(
                observed = %report.observed,
                expected = ?report.expected,
                "result mismatch"
            );
        }
        reports.push(report);
    }
    Ok(reports)
}

// ============================================================================
// Counters
// ============================================================================

fn count_with<S, C>(
    spawner: &S,
    config: &HarnessConfig,
    experiment: Experiment,
    counter: Arc<C>,
) -> Result<Report, HarnessError>
where
    S: Spawner,
    C: Counter + 'static,
{
    let per_task = config.per_task;
    let start = Instant::now();

    let (handles, spawn_err) = spawn_each(spawner, experiment.name(), config.tasks, |_| {
        let counter = Arc::clone(&counter);
        move || {
            for _ in 0..per_task {
                counter.increment();
            }
        }
    });

    let joined = join_all(handles);
    if let Some(err) = spawn_err {
        return Err(err);
    }
    joined?;
    let elapsed = start.elapsed();

    Ok(Report {
        experiment,
        expected: Some((config.tasks as u64 * per_task).to_string()),
        observed: counter.read().to_string(),
        elapsed,
    })
}

// ============================================================================
// Hand-off queue
// ============================================================================

fn handoff<S: Spawner>(spawner: &S, config: &HarnessConfig) -> Result<Report, HarnessError> {
    let queue = Arc::new(HandoffQueue::with_config(QueueConfig {
        spin_iters: config.spin_iters,
    }));
    let remaining = Arc::new(AtomicUsize::new(config.producers));
    let items = config.items;
    let start = Instant::now();

    let (consumers, consumer_err) = spawn_each(spawner, "consumer", config.consumers, |_| {
        let queue = Arc::clone(&queue);
        move || {
            let (mut count, mut sum) = (0u64, 0u64);
            while let Some(item) = queue.drain_blocking() {
                count += 1;
                sum += item;
            }
            (count, sum)
        }
    });

    let (producers, producer_err) = if consumer_err.is_none() {
        spawn_each(spawner, "producer", config.producers, |_| {
            let queue = Arc::clone(&queue);
            let remaining = Arc::clone(&remaining);
            move || {
                for item in 0..items {
                    queue.enqueue(item)?;
                }
                // Last producer out closes the queue
                if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                    queue.close()?;
                }
                Ok::<_, HarnessError>(())
            }
        })
    } else {
        (Vec::new(), None)
    };

    // Every task that started is joined before looking at errors. Whatever
    // happened, the queue must end up closed or the consumers never return.
    let produced = join_all(producers)
        .and_then(|results| results.into_iter().collect::<Result<Vec<()>, _>>());
    if !queue.is_closed() {
        queue.close()?;
    }
    let drained = join_all(consumers);

    if let Some(err) = consumer_err.or(producer_err) {
        return Err(err);
    }
    produced?;
    let drained = drained?;
    let elapsed = start.elapsed();

    let (count, sum) = drained
        .iter()
        .fold((0u64, 0u64), |(c, s), &(dc, ds)| (c + dc, s + ds));
    let expected_sum = handoff_expected_sum(config.producers as u64, items)
        .ok_or(HarnessError::InvalidConfig("handoff sum overflows"))?;
    let expected_count = config.producers as u64 * items;

    Ok(Report {
        experiment: Experiment::Handoff,
        expected: Some(format!("sum {expected_sum} over {expected_count} items")),
        observed: format!("sum {sum} over {count} items"),
        elapsed,
    })
}

// ============================================================================
// One-shot
// ============================================================================

fn async_sum<S: Spawner>(spawner: &S) -> Result<Report, HarnessError> {
    let start = Instant::now();
    let (rx, handle) = spawn_with_result(spawner, "async-sum", || (1..=100u64).sum::<u64>())?;

    let value = rx.await_value()?;
    handle.join()?;

    Ok(Report {
        experiment: Experiment::AsyncSum,
        expected: Some("5050".to_string()),
        observed: value.to_string(),
        elapsed: start.elapsed(),
    })
}

fn promise<S: Spawner>(spawner: &S) -> Result<Report, HarnessError> {
    let start = Instant::now();
    let (tx, rx) = strand_oneshot::channel::<String>();

    let handle = spawner.spawn("promise", move || {
        tx.fulfill(PROMISE_MESSAGE.to_string())
            .map_err(|err| HarnessError::Fulfill(err.to_string()))
    })?;

    // A panic in the body shows up as abandonment here; report the panic.
    let value = rx.await_value();
    handle.join()??;
    let value = value?;

    Ok(Report {
        experiment: Experiment::Promise,
        expected: Some(PROMISE_MESSAGE.to_string()),
        observed: value,
        elapsed: start.elapsed(),
    })
}

// ============================================================================
// Task-local storage
// ============================================================================

fn task_local<S: Spawner>(spawner: &S) -> Result<Report, HarnessError> {
    let start = Instant::now();
    let cell = Arc::new(LocalCell::<i32>::new());
    let barrier = Arc::new(Barrier::new(2));

    let values = [100, 200];
    let (handles, spawn_err) = spawn_each(spawner, "task-local", values.len(), |i| {
        let cell = Arc::clone(&cell);
        let barrier = Arc::clone(&barrier);
        let value = values[i];
        move || {
            cell.set(value);
            // Both writes land before either task reads
            barrier.wait();
            cell.get()
        }
    });

    if let Some(err) = spawn_err {
        // Stand in for the task that never started so the other can finish
        if handles.len() == 1 {
            barrier.wait();
        }
        let _ = join_all(handles);
        return Err(err);
    }
    let seen = join_all(handles)?;
    let main = cell.get();

    let observed = format!(
        "{}, main {main}",
        seen.iter()
            .map(i32::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok(Report {
        experiment: Experiment::TaskLocal,
        expected: Some("100, 200, main 0".to_string()),
        observed,
        elapsed: start.elapsed(),
    })
}

// ============================================================================
// Timing
// ============================================================================

fn timed_loop(iters: u64) -> Report {
    let start = Instant::now();
    let mut acc = 0u64;
    for i in 0..iters {
        acc = std::hint::black_box(acc.wrapping_add(i));
    }
    let elapsed = start.elapsed();
    tracing::trace!(acc, "timed loop done");

    Report {
        experiment: Experiment::TimedLoop,
        expected: None,
        observed: format!("{iters} iterations"),
        elapsed,
    }
}

/// Spawns `count` tasks named `{prefix}-{i}`, stopping at the first spawn
/// failure. Handles of the tasks that did start are always returned so the
/// caller can join them.
fn spawn_each<S, F, R>(
    spawner: &S,
    prefix: &str,
    count: usize,
    mut body: impl FnMut(usize) -> F,
) -> (Vec<TaskHandle<R>>, Option<HarnessError>)
where
    S: Spawner,
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let mut handles = Vec::with_capacity(count);
    for i in 0..count {
        match spawner.spawn(&format!("{prefix}-{i}"), body(i)) {
            Ok(handle) => handles.push(handle),
            Err(err) => return (handles, Some(err)),
        }
    }
    (handles, None)
}

/// Joins every handle, even after a failure, and returns the first error.
fn join_all<R>(handles: Vec<TaskHandle<R>>) -> Result<Vec<R>, HarnessError> {
    let mut results = Vec::with_capacity(handles.len());
    let mut first_err = None;
    for handle in handles {
        match handle.join() {
            Ok(value) => results.push(value),
            Err(err) => {
                first_err.get_or_insert(err);
            }
        }
    }
    match first_err {
        Some(err) => Err(err),
        None => Ok(results),
    }
}
