//! Submission and completion throughput for the thread pool.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use quarry_pool::ThreadPool;

fn bench_submit_wait(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit_wait");
    const TASKS: usize = 1_000;

    for workers in [1, 2, 4, 8].iter() {
        group.throughput(Throughput::Elements(TASKS as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(workers),
            workers,
            |b, &workers| {
                let pool = ThreadPool::new(workers);
                b.iter(|| {
                    for i in 0..TASKS {
                        pool.submit(move || black_box(i) * 2).unwrap();
                    }
                    pool.wait();
                });
            },
        );
    }

    group.finish();
}

fn bench_completion_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("completion_roundtrip");

    group.bench_function("single_task", |b| {
        let pool = ThreadPool::new(2);
        b.iter(|| {
            let completion = pool.submit(|| black_box(42)).unwrap();
            black_box(completion.get().unwrap());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_submit_wait, bench_completion_roundtrip);
criterion_main!(benches);
