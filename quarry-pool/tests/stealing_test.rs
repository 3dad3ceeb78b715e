//! Work-stealing behavior under deliberately unbalanced load.

use quarry_pool::ThreadPool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
#[cfg_attr(miri, ignore)]
fn test_stealing_balances_pinned_load() {
    const TASKS: usize = 1_000;

    let pool = ThreadPool::new(4);
    let executed = Arc::new(AtomicUsize::new(0));

    // Everything lands in worker 0's local queue; the others only get
    // work by stealing.
    for _ in 0..TASKS {
        let executed = executed.clone();
        pool.submit_pinned(0, move || {
            thread::sleep(Duration::from_micros(200));
            executed.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();
    }
    pool.wait();

    assert_eq!(executed.load(Ordering::Relaxed), TASKS);
    let counts = pool.worker_task_counts();
    assert_eq!(counts.iter().sum::<usize>(), TASKS);
    for (worker, count) in counts.iter().enumerate() {
        assert!(*count > 0, "worker {worker} never stole a task: {counts:?}");
    }
}

#[test]
fn test_single_worker_gets_no_steals() {
    let pool = ThreadPool::new(1);
    for i in 0..100 {
        pool.submit_pinned(0, move || i).unwrap();
    }
    pool.wait();
    assert_eq!(pool.worker_task_counts(), vec![100]);
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_every_worker_makes_progress() {
    const TASKS: usize = 1_000;

    let pool = ThreadPool::new(4);
    for _ in 0..TASKS {
        pool.submit(|| thread::sleep(Duration::from_micros(100)))
            .unwrap();
    }
    pool.wait();

    let counts = pool.worker_task_counts();
    assert_eq!(counts.iter().sum::<usize>(), TASKS);
    for (worker, count) in counts.iter().enumerate() {
        assert!(*count > 0, "worker {worker} starved: {counts:?}");
    }
}

#[test]
fn test_pinned_index_wraps() {
    let pool = ThreadPool::new(2);
    let completion = pool.submit_pinned(7, || 1).unwrap();
    assert_eq!(completion.get(), Ok(1));
}
