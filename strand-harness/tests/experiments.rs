//! End-to-end runs of the experiments through the public harness API.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use strand_harness::logging::init_test_logging;
use strand_harness::{
    run, spawn_with_result, Experiment, HarnessConfig, HarnessError, Spawner, TaskHandle,
    ThreadSpawner, PROMISE_MESSAGE,
};
use strand_oneshot::RecvError;
use strand_queue::HandoffQueue;

// ============================================================================
// Default workload
// ============================================================================

#[test]
fn default_run_passes_everything() {
    init_test_logging();

    let reports = run(
        &ThreadSpawner::new(),
        &HarnessConfig::default(),
        &Experiment::ALL,
    )
    .unwrap();

    assert_eq!(reports.len(), Experiment::ALL.len());
    for report in &reports {
        assert!(report.passed(), "{report}");
    }

    let observed: Vec<&str> = reports.iter().map(|r| r.observed.as_str()).collect();
    assert_eq!(
        observed,
        vec![
            "40000",
            "40000",
            "sum 4950 over 100 items",
            "5050",
            PROMISE_MESSAGE,
            "100, 200, main 0",
            "1000000 iterations",
        ]
    );
}

#[test]
fn contended_handoff_many_consumers() {
    init_test_logging();

    let config = HarnessConfig {
        producers: 4,
        consumers: 8,
        items: 1_000,
        ..Default::default()
    };
    let reports = run(&ThreadSpawner::new(), &config, &[Experiment::Handoff]).unwrap();

    assert_eq!(reports[0].observed, "sum 1998000 over 4000 items");
    assert!(reports[0].passed());
}

#[test]
fn repeated_counter_runs_are_exact() {
    init_test_logging();

    let config = HarnessConfig {
        tasks: 8,
        per_task: 5_000,
        ..Default::default()
    };
    for _ in 0..5 {
        let reports = run(
            &ThreadSpawner::new(),
            &config,
            &[Experiment::LockedCounter, Experiment::AtomicCounter],
        )
        .unwrap();
        assert!(reports.iter().all(|r| r.observed == "40000"));
    }
}

// ============================================================================
// Custom spawners
// ============================================================================

/// Counts spawns, delegating to OS threads.
#[derive(Default)]
struct CountingSpawner {
    inner: ThreadSpawner,
    spawned: AtomicUsize,
}

impl Spawner for CountingSpawner {
    fn spawn<F, R>(&self, name: &str, body: F) -> Result<TaskHandle<R>, HarnessError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.spawned.fetch_add(1, Ordering::Relaxed);
        self.inner.spawn(name, body)
    }
}

#[test]
fn experiments_go_through_the_spawner() {
    let spawner = CountingSpawner::default();
    let config = HarnessConfig {
        producers: 2,
        consumers: 3,
        ..Default::default()
    };

    run(&spawner, &config, &[Experiment::Handoff, Experiment::TaskLocal]).unwrap();

    // 2 producers + 3 consumers, then 2 task-local tasks
    assert_eq!(spawner.spawned.load(Ordering::Relaxed), 7);
}

#[test]
fn timed_loop_spawns_nothing() {
    let spawner = CountingSpawner::default();
    run(&spawner, &HarnessConfig::default(), &[Experiment::TimedLoop]).unwrap();
    assert_eq!(spawner.spawned.load(Ordering::Relaxed), 0);
}

/// Starts the first `allow` tasks, then refuses. Counts bodies that ran to
/// completion.
struct LimitedSpawner {
    inner: ThreadSpawner,
    allow: usize,
    started: AtomicUsize,
    finished: Arc<AtomicUsize>,
}

impl LimitedSpawner {
    fn new(allow: usize) -> Self {
        Self {
            inner: ThreadSpawner::new(),
            allow,
            started: AtomicUsize::new(0),
            finished: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Spawner for LimitedSpawner {
    fn spawn<F, R>(&self, name: &str, body: F) -> Result<TaskHandle<R>, HarnessError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.started.load(Ordering::SeqCst) >= self.allow {
            return Err(HarnessError::Spawn {
                name: name.to_string(),
                source: io::Error::other("spawn limit reached"),
            });
        }
        self.started.fetch_add(1, Ordering::SeqCst);

        let finished = Arc::clone(&self.finished);
        self.inner.spawn(name, move || {
            let value = body();
            finished.fetch_add(1, Ordering::SeqCst);
            value
        })
    }
}

#[test]
fn partial_producer_spawn_joins_started_tasks() {
    init_test_logging();

    // 2 consumers and 1 of 3 producers start
    let spawner = LimitedSpawner::new(3);
    let config = HarnessConfig {
        producers: 3,
        consumers: 2,
        items: 10_000,
        ..Default::default()
    };

    let err = run(&spawner, &config, &[Experiment::Handoff]).unwrap_err();
    assert!(matches!(err, HarnessError::Spawn { ref name, .. } if name == "producer-1"));

    // Nothing left running once run() returns
    assert_eq!(spawner.finished.load(Ordering::SeqCst), 3);
}

#[test]
fn partial_consumer_spawn_joins_started_tasks() {
    let spawner = LimitedSpawner::new(1);
    let config = HarnessConfig {
        consumers: 2,
        ..Default::default()
    };

    let err = run(&spawner, &config, &[Experiment::Handoff]).unwrap_err();
    assert!(matches!(err, HarnessError::Spawn { ref name, .. } if name == "consumer-1"));
    assert_eq!(spawner.finished.load(Ordering::SeqCst), 1);
}

#[test]
fn partial_counter_spawn_joins_started_tasks() {
    let spawner = LimitedSpawner::new(2);

    let err = run(&spawner, &HarnessConfig::default(), &[Experiment::AtomicCounter]).unwrap_err();
    assert!(matches!(err, HarnessError::Spawn { .. }));
    assert_eq!(spawner.finished.load(Ordering::SeqCst), 2);
}

#[test]
fn partial_task_local_spawn_does_not_hang() {
    let spawner = LimitedSpawner::new(1);
    let start = Instant::now();

    let err = run(&spawner, &HarnessConfig::default(), &[Experiment::TaskLocal]).unwrap_err();
    assert!(matches!(err, HarnessError::Spawn { ref name, .. } if name == "task-local-1"));
    assert_eq!(spawner.finished.load(Ordering::SeqCst), 1);
    assert!(start.elapsed() < Duration::from_secs(5));
}

// ============================================================================
// Liveness
// ============================================================================

#[test]
fn close_releases_consumers_spawned_through_harness() {
    init_test_logging();

    let spawner = ThreadSpawner::new();
    let queue = Arc::new(HandoffQueue::<u64>::new());

    let receivers: Vec<_> = (0..3)
        .map(|i| {
            let queue = Arc::clone(&queue);
            spawn_with_result(&spawner, &format!("waiter-{i}"), move || {
                queue.drain_blocking()
            })
            .unwrap()
        })
        .collect();

    thread::sleep(Duration::from_millis(50));
    queue.close().unwrap();

    for (rx, handle) in receivers {
        assert_eq!(rx.await_value(), Ok(None));
        handle.join().unwrap();
    }
}

#[test]
fn panicking_task_is_reported_not_hung() {
    let spawner = ThreadSpawner::new();
    let start = Instant::now();

    let (rx, handle) =
        spawn_with_result(&spawner, "panics", || -> u64 { panic!("lost result") }).unwrap();

    assert_eq!(rx.await_value(), Err(RecvError::Abandoned));
    assert!(matches!(
        handle.join(),
        Err(HarnessError::TaskPanicked { .. })
    ));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn invalid_config_runs_nothing() {
    let spawner = CountingSpawner::default();
    let config = HarnessConfig {
        tasks: 0,
        ..Default::default()
    };

    let err = run(&spawner, &config, &Experiment::ALL).unwrap_err();
    assert!(err.to_string().contains("tasks"));
    assert_eq!(spawner.spawned.load(Ordering::Relaxed), 0);
}
