use quarry_pool::{PoolError, ThreadPool, WaitStatus};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_submit_returns_result() {
    let pool = ThreadPool::new(2);
    let completion = pool.submit(|| 42).unwrap();
    assert_eq!(completion.get(), Ok(42));
    // The credit is settled once the task is done.
    pool.wait();
}

#[test]
fn test_panic_propagates_through_completion() {
    let pool = ThreadPool::new(2);

    let boom = pool.submit(|| -> usize { panic!("boom") }).unwrap();
    assert_eq!(boom.get(), Err(PoolError::TaskFailed("boom".into())));

    // The worker survived the panic and keeps taking work.
    let after = pool.submit(|| 7).unwrap();
    assert_eq!(after.get(), Ok(7));
}

#[test]
fn test_panic_with_string_payload() {
    let pool = ThreadPool::new(1);
    let message = String::from("exploded at runtime");
    let boom = pool
        .submit(move || -> () { panic!("{}", message) })
        .unwrap();
    assert_eq!(
        boom.get(),
        Err(PoolError::TaskFailed("exploded at runtime".into()))
    );
}

#[test]
fn test_submit_after_shutdown_fails() {
    let pool = ThreadPool::new(2);
    pool.shutdown();
    assert!(!pool.is_running());
    assert_eq!(pool.submit(|| 1).unwrap_err(), PoolError::ShutDown);
}

#[test]
fn test_wait_observes_all_tasks() {
    let pool = ThreadPool::new(4);
    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..200 {
        let counter = counter.clone();
        pool.submit(move || {
            counter.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();
    }
    pool.wait();
    assert_eq!(counter.load(Ordering::Relaxed), 200);
}

#[test]
fn test_wait_for_times_out_and_pool_survives() {
    let pool = ThreadPool::new(1);
    let completion = pool
        .submit(|| thread::sleep(Duration::from_millis(300)))
        .unwrap();

    assert_eq!(
        pool.wait_for(Duration::from_millis(20)),
        WaitStatus::TimedOut
    );
    assert!(pool.is_running());

    assert_eq!(completion.get(), Ok(()));
    assert_eq!(pool.wait_for(Duration::from_secs(5)), WaitStatus::Quiesced);
}

#[test]
fn test_is_ready_transitions() {
    let pool = ThreadPool::new(1);
    let gate = Arc::new(AtomicUsize::new(0));
    let task_gate = gate.clone();
    let completion = pool
        .submit(move || {
            while task_gate.load(Ordering::Acquire) == 0 {
                thread::sleep(Duration::from_millis(1));
            }
            99
        })
        .unwrap();

    assert!(!completion.is_ready());
    gate.store(1, Ordering::Release);
    assert_eq!(completion.get(), Ok(99));
}

#[test]
fn test_many_results_arrive_intact() {
    let pool = ThreadPool::new(4);
    let completions: Vec<_> = (0..1_000)
        .map(|i| pool.submit(move || i * 2).unwrap())
        .collect();
    for (i, completion) in completions.into_iter().enumerate() {
        assert_eq!(completion.get(), Ok(i * 2));
    }
}

#[test]
fn test_try_get_is_non_blocking() {
    let pool = ThreadPool::new(1);
    let gate = Arc::new(AtomicUsize::new(0));
    let task_gate = gate.clone();
    let completion = pool
        .submit(move || {
            while task_gate.load(Ordering::Acquire) == 0 {
                thread::sleep(Duration::from_millis(1));
            }
            5
        })
        .unwrap();

    // Pending: no value yet, and the probe must not block.
    assert_eq!(completion.try_get(), None);

    gate.store(1, Ordering::Release);
    pool.wait();
    assert_eq!(completion.try_get(), Some(Ok(5)));
    // The slot is drained by the first successful take.
    assert_eq!(completion.try_get(), None);
    assert!(completion.is_ready());
}

#[test]
fn test_idle_count_stays_in_range() {
    let pool = ThreadPool::new(3);
    pool.submit(|| ()).unwrap();
    pool.wait();
    // Advisory gauge, but never out of bounds.
    assert!(pool.idle_worker_count() <= pool.worker_count());
}

#[test]
fn test_default_pool_runs_tasks() {
    let pool = ThreadPool::default();
    assert!(pool.worker_count() >= 1);
    let completion = pool.submit(|| "ok").unwrap();
    assert_eq!(completion.get(), Ok("ok"));
}

#[test]
fn test_submits_from_many_threads() {
    let pool = Arc::new(ThreadPool::new(4));
    let counter = Arc::new(AtomicUsize::new(0));
    let mut handles = vec![];
    for _ in 0..8 {
        let pool = pool.clone();
        let counter = counter.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..250 {
                let counter = counter.clone();
                pool.submit(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                })
                .unwrap();
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    pool.wait();
    assert_eq!(counter.load(Ordering::Relaxed), 8 * 250);
}
