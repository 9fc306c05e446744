use callback_scheduler::Scheduler;
use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn bench_schedule_far_future(c: &mut Criterion) {
    let mut group = c.benchmark_group("schedule_far_future");
    group.throughput(Throughput::Elements(100));

    // Fresh scheduler per iteration so neither the queue nor the thread count grows
    group.bench_function("100_tasks", |b| {
        b.iter_batched(
            Scheduler::new,
            |scheduler| {
                for _ in 0..100 {
                    scheduler.schedule(|| {}, black_box(Duration::from_secs(3600)));
                }
                scheduler
            },
            BatchSize::PerIteration,
        );
    });

    group.finish();
}

fn bench_schedule_and_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("schedule_and_drain");

    for count in [100usize, 1_000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let scheduler = Scheduler::new();
                let done = Arc::new(AtomicUsize::new(0));
                for _ in 0..count {
                    let done = done.clone();
                    scheduler.schedule(
                        move || {
                            done.fetch_add(1, Ordering::Relaxed);
                        },
                        Duration::ZERO,
                    );
                }
                while done.load(Ordering::Relaxed) < count {
                    thread::yield_now();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_schedule_far_future, bench_schedule_and_drain);
criterion_main!(benches);
