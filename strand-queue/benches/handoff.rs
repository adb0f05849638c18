//! Benchmarks for hand-off queue throughput.
//!
//! Compares strand-queue against crossbeam-channel's unbounded channel, which
//! offers the same "unbounded, blocking recv, disconnect to finish" shape.
//! crossbeam-queue's `SegQueue` has no blocking side at all and serves as the
//! lock-free floor for the single-threaded case.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::thread;

use strand_queue::{HandoffQueue, QueueConfig};

const MESSAGE_COUNT: u64 = 100_000;

// ============================================================================
// Single-threaded cost
// ============================================================================

fn bench_single_thread(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_thread_roundtrip");

    group.bench_function("strand_handoff/u64", |b| {
        let q = HandoffQueue::<u64>::new();
        b.iter(|| {
            q.enqueue(black_box(42)).unwrap();
            black_box(q.drain_blocking().unwrap())
        });
    });

    group.bench_function("crossbeam_unbounded/u64", |b| {
        let (tx, rx) = crossbeam_channel::unbounded::<u64>();
        b.iter(|| {
            tx.send(black_box(42)).unwrap();
            black_box(rx.recv().unwrap())
        });
    });

    group.bench_function("crossbeam_segqueue/u64", |b| {
        let q = crossbeam_queue::SegQueue::<u64>::new();
        b.iter(|| {
            q.push(black_box(42));
            black_box(q.pop().unwrap())
        });
    });

    group.finish();
}

// ============================================================================
// Producers / consumers until close
// ============================================================================

fn run_handoff(producers: u64, consumers: u64, spin_iters: usize) -> u64 {
    let q = Arc::new(HandoffQueue::with_config(QueueConfig { spin_iters }));
    let per_producer = MESSAGE_COUNT / producers;

    let prods: Vec<_> = (0..producers)
        .map(|_| {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                for i in 0..per_producer {
                    q.enqueue(i).unwrap();
                }
            })
        })
        .collect();

    let cons: Vec<_> = (0..consumers)
        .map(|_| {
            let q = Arc::clone(&q);
            thread::spawn(move || q.iter().fold(0u64, u64::wrapping_add))
        })
        .collect();

    for h in prods {
        h.join().unwrap();
    }
    q.close().unwrap();

    cons.into_iter().map(|h| h.join().unwrap()).sum()
}

fn run_crossbeam(producers: u64, consumers: u64) -> u64 {
    let (tx, rx) = crossbeam_channel::unbounded::<u64>();
    let per_producer = MESSAGE_COUNT / producers;

    let prods: Vec<_> = (0..producers)
        .map(|_| {
            let tx = tx.clone();
            thread::spawn(move || {
                for i in 0..per_producer {
                    tx.send(i).unwrap();
                }
            })
        })
        .collect();
    drop(tx);

    let cons: Vec<_> = (0..consumers)
        .map(|_| {
            let rx = rx.clone();
            thread::spawn(move || rx.iter().fold(0u64, u64::wrapping_add))
        })
        .collect();

    for h in prods {
        h.join().unwrap();
    }

    cons.into_iter().map(|h| h.join().unwrap()).sum()
}

fn bench_cross_thread(c: &mut Criterion) {
    let mut group = c.benchmark_group("cross_thread_throughput");
    group.throughput(Throughput::Elements(MESSAGE_COUNT));

    for (producers, consumers) in [(1u64, 1u64), (4, 1), (1, 4), (4, 4)] {
        let id = format!("{producers}p{consumers}c");

        group.bench_with_input(
            BenchmarkId::new("strand_handoff", &id),
            &(producers, consumers),
            |b, &(p, c)| b.iter(|| black_box(run_handoff(p, c, 8))),
        );

        group.bench_with_input(
            BenchmarkId::new("strand_handoff_no_spin", &id),
            &(producers, consumers),
            |b, &(p, c)| b.iter(|| black_box(run_handoff(p, c, 0))),
        );

        group.bench_with_input(
            BenchmarkId::new("crossbeam_unbounded", &id),
            &(producers, consumers),
            |b, &(p, c)| b.iter(|| black_box(run_crossbeam(p, c))),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_single_thread, bench_cross_thread);
criterion_main!(benches);
