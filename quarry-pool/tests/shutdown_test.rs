//! Shutdown choreography: idempotence, drain, cancellation.

use quarry_pool::{PoolError, ThreadPool};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_shutdown_is_idempotent() {
    let pool = ThreadPool::new(2);
    pool.shutdown();
    assert!(!pool.is_running());
    // Second call is a no-op, not a hang or a panic.
    pool.shutdown();
    assert!(!pool.is_running());
}

#[test]
fn test_shutdown_lets_queued_work_finish() {
    let pool = ThreadPool::new(2);
    let counter = Arc::new(AtomicUsize::new(0));
    let completions: Vec<_> = (0..50)
        .map(|_| {
            let counter = counter.clone();
            pool.submit(move || {
                thread::sleep(Duration::from_millis(1));
                counter.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap()
        })
        .collect();

    pool.shutdown();

    assert_eq!(counter.load(Ordering::Relaxed), 50);
    for completion in completions {
        assert_eq!(completion.get(), Ok(()));
    }
}

#[test]
fn test_drop_invokes_shutdown() {
    let counter = Arc::new(AtomicUsize::new(0));
    let completions: Vec<_> = {
        let pool = ThreadPool::new(2);
        (0..20)
            .map(|_| {
                let counter = counter.clone();
                pool.submit(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                })
                .unwrap()
            })
            .collect()
    };

    // The pool is gone; every completion must still resolve.
    assert_eq!(counter.load(Ordering::Relaxed), 20);
    for completion in completions {
        assert_eq!(completion.get(), Ok(()));
    }
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_shutdown_cancels_tasks_stuck_behind_a_blocker() {
    let pool = ThreadPool::new(1);
    let release = Arc::new(AtomicBool::new(false));

    let blocker_release = release.clone();
    let blocker = pool
        .submit(move || {
            while !blocker_release.load(Ordering::Acquire) {
                thread::sleep(Duration::from_millis(1));
            }
        })
        .unwrap();

    // Give the single worker time to start the blocker, then queue work
    // that can never run before shutdown's drain window closes.
    thread::sleep(Duration::from_millis(50));
    let stuck: Vec<_> = (0..3).map(|i| pool.submit(move || i).unwrap()).collect();

    // Drain deadline expires, the worker is detached, the queue drained.
    pool.shutdown();
    assert!(!pool.is_running());

    for completion in stuck {
        assert_eq!(completion.get(), Err(PoolError::ShutDown));
    }

    // The detached worker finishes its task normally once released.
    release.store(true, Ordering::Release);
    assert_eq!(blocker.get(), Ok(()));
}

#[test]
fn test_every_completion_resolves_after_shutdown() {
    let pool = ThreadPool::new(4);
    let completions: Vec<_> = (0..200)
        .map(|i| pool.submit(move || i).unwrap())
        .collect();
    pool.shutdown();

    for (i, completion) in completions.into_iter().enumerate() {
        match completion.get() {
            Ok(value) => assert_eq!(value, i),
            Err(PoolError::ShutDown) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
}
