//! The thread-pool facade: submission, waiting, and the shutdown
//! choreography.

use crate::completion::{Completion, Inner};
use crate::error::{PoolError, WaitStatus};
use crate::task::{Job, Task};
use crate::worker::{worker_loop, Shared};
use crossbeam_utils::Backoff;
use quarry_queue::Queue;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How long shutdown lets already-queued work drain before it starts
/// cancelling.
const DRAIN_DEADLINE: Duration = Duration::from_secs(2);

/// How long shutdown waits for each worker to stop before detaching it.
const JOIN_DEADLINE: Duration = Duration::from_secs(1);

/// Sleep between quiescence polls once spinning stops paying off.
const POLL_INTERVAL: Duration = Duration::from_micros(100);

/// A fixed-size work-stealing thread pool.
///
/// Every worker owns a lock-free MPMC queue; a shared global queue takes
/// overflow. Submitted closures return a [`Completion`] through which the
/// caller awaits the result or the panic that ended it.
///
/// # Examples
///
/// ```
/// use quarry_pool::ThreadPool;
///
/// let pool = ThreadPool::new(2);
/// let completion = pool.submit(|| 6 * 7).unwrap();
/// assert_eq!(completion.get(), Ok(42));
/// pool.shutdown();
/// ```
pub struct ThreadPool {
    shared: Arc<Shared>,
    handles: Mutex<Vec<(usize, JoinHandle<()>)>>,
}

impl Default for ThreadPool {
    /// A pool sized to the machine's available parallelism.
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

impl ThreadPool {
    /// Creates a pool with `num_threads` workers (at least one) and
    /// spawns them immediately.
    pub fn new(num_threads: usize) -> Self {
        let count = num_threads.max(1);
        let shared = Arc::new(Shared::new(count));
        let handles = (0..count)
            .map(|index| {
                let shared = shared.clone();
                let handle = thread::Builder::new()
                    .name(format!("quarry-worker-{index}"))
                    .spawn(move || worker_loop(shared, index))
                    .expect("failed to spawn worker thread");
                (index, handle)
            })
            .collect();
        Self {
            shared,
            handles: Mutex::new(handles),
        }
    }

    /// Number of workers.
    pub fn worker_count(&self) -> usize {
        self.shared.workers.len()
    }

    /// Whether the pool still accepts work.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Submits a closure and returns the completion handle for its
    /// result.
    ///
    /// Fails with [`PoolError::ShutDown`] once [`ThreadPool::shutdown`]
    /// has begun; nothing is queued in that case.
    pub fn submit<F, R>(&self, f: F) -> Result<Completion<R>, PoolError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.submit_inner(f, None)
    }

    /// Submits a closure directly to one worker's local queue.
    ///
    /// `worker` wraps around the worker count. Mainly a diagnostic aid:
    /// it creates the unbalanced load patterns that exercise stealing.
    pub fn submit_pinned<F, R>(&self, worker: usize, f: F) -> Result<Completion<R>, PoolError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.submit_inner(f, Some(worker % self.worker_count()))
    }

    fn submit_inner<F, R>(&self, f: F, target: Option<usize>) -> Result<Completion<R>, PoolError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if !self.shared.running.load(Ordering::Acquire) {
            return Err(PoolError::ShutDown);
        }

        let inner = Inner::new();
        let completion = Completion::from_inner(inner.clone());
        let job_inner = inner.clone();
        let job: Job = Box::new(move || {
            match panic::catch_unwind(AssertUnwindSafe(f)) {
                Ok(value) => job_inner.complete(Ok(value)),
                Err(payload) => {
                    job_inner.complete(Err(PoolError::TaskFailed(panic_message(payload.as_ref()))))
                }
            }
        });
        let cancel: Job = Box::new(move || inner.complete(Err(PoolError::ShutDown)));
        let task = Task::new(job, cancel);

        // Credit the counter before the push so no worker can finish a
        // task that was never counted.
        self.shared.active_tasks.fetch_add(1, Ordering::AcqRel);
        match target {
            Some(index) => self.shared.workers[index].queue.push(task),
            None => self.shared.dispatch(task),
        }
        Ok(completion)
    }

    /// Blocks until no task is running and every queue is empty.
    ///
    /// Polls rather than blocking on a wait-set; concurrent submissions
    /// extend the wait.
    pub fn wait(&self) {
        let backoff = Backoff::new();
        while !self.shared.quiescent() {
            if backoff.is_completed() {
                thread::sleep(POLL_INTERVAL);
            } else {
                backoff.snooze();
            }
        }
    }

    /// Like [`ThreadPool::wait`], bounded by `timeout`.
    ///
    /// Returns [`WaitStatus::TimedOut`] when the deadline elapses first;
    /// the pool keeps running either way.
    pub fn wait_for(&self, timeout: Duration) -> WaitStatus {
        self.wait_until(Instant::now() + timeout)
    }

    fn wait_until(&self, deadline: Instant) -> WaitStatus {
        let backoff = Backoff::new();
        while !self.shared.quiescent() {
            if Instant::now() >= deadline {
                return WaitStatus::TimedOut;
            }
            if backoff.is_completed() {
                thread::sleep(POLL_INTERVAL);
            } else {
                backoff.snooze();
            }
        }
        WaitStatus::Quiesced
    }

    /// Stops the pool.
    ///
    /// Phases: refuse new work, give queued work a bounded drain window,
    /// wake sleeping workers with one sentinel each, join every worker
    /// (detaching stragglers past the deadline), then cancel whatever
    /// never ran so no completion is left hanging. Idempotent; the
    /// second call returns immediately.
    pub fn shutdown(&self) {
        if self
            .shared
            .running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        if self.wait_until(Instant::now() + DRAIN_DEADLINE) == WaitStatus::TimedOut {
            crate::warn!(
                "pool shutdown: queued work did not drain within {:?}",
                DRAIN_DEADLINE
            );
        }

        for worker in self.shared.workers.iter() {
            worker.queue.push(Task::sentinel());
        }

        let handles = std::mem::take(&mut *self.handles.lock().unwrap());
        let deadline = Instant::now() + JOIN_DEADLINE;
        for (index, handle) in handles {
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(1));
            }
            if handle.is_finished() {
                if handle.join().is_err() {
                    crate::error!("worker {} terminated with a panic", index);
                }
            } else {
                crate::warn!("worker {} did not stop in time; detaching it", index);
                drop(handle);
            }
        }

        for worker in self.shared.workers.iter() {
            self.drain_cancelling(&worker.queue);
        }
        self.drain_cancelling(&self.shared.global);
    }

    /// Pops every remaining task and resolves its completion as
    /// cancelled. Sentinels carry no credit and are simply discarded.
    fn drain_cancelling(&self, queue: &Queue<Task>) {
        while let Some(task) = queue.try_pop() {
            if !task.is_sentinel() {
                task.cancel();
                self.shared.active_tasks.fetch_sub(1, Ordering::AcqRel);
            }
        }
    }

    /// Tasks each worker has executed so far, by worker index.
    ///
    /// Diagnostic counters: they trail the true values while workers are
    /// busy storing them.
    pub fn worker_task_counts(&self) -> Vec<usize> {
        self.shared
            .workers
            .iter()
            .map(|w| w.executed.load(Ordering::Relaxed))
            .collect()
    }

    /// Number of workers currently parked at the deep end of the back-off
    /// ladder. Advisory, like the counters above.
    pub fn idle_worker_count(&self) -> usize {
        self.shared
            .workers
            .iter()
            .filter(|w| w.idle.load(Ordering::Relaxed))
            .count()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("task panicked")
    }
}
