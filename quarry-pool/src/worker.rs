//! Worker threads and the state they share with the pool facade.

use crate::rand::FastRand;
use crate::task::Task;
use quarry_queue::Queue;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Bounded scan width when submit looks for a shorter neighbour queue.
const DISPATCH_SCAN: usize = 2;

/// Local queue length beyond which submit overflows into the global
/// queue.
const LOCAL_SOFT_CAP: usize = 1024;

/// Idle-iteration counts delimiting the back-off ladder rungs.
const SPIN_LIMIT: u32 = 16;
const NAP_LIMIT: u32 = 64;

const NAP: Duration = Duration::from_micros(50);
const SLEEP: Duration = Duration::from_millis(1);

/// Per-worker state, indexed by the worker's stable position.
pub(crate) struct WorkerState {
    pub(crate) queue: Queue<Task>,
    pub(crate) idle: AtomicBool,
    pub(crate) executed: AtomicUsize,
}

impl WorkerState {
    fn new() -> Self {
        Self {
            queue: Queue::new(),
            idle: AtomicBool::new(false),
            executed: AtomicUsize::new(0),
        }
    }
}

/// State shared between the facade and every worker thread.
///
/// Workers receive an `Arc<Shared>` at spawn time and never a pool
/// back-pointer, so the facade can drop independently of stragglers.
pub(crate) struct Shared {
    pub(crate) workers: Box<[WorkerState]>,
    pub(crate) global: Queue<Task>,
    pub(crate) running: AtomicBool,
    pub(crate) active_tasks: AtomicUsize,
    cursor: AtomicUsize,
}

impl Shared {
    pub(crate) fn new(workers: usize) -> Self {
        Self {
            workers: (0..workers).map(|_| WorkerState::new()).collect(),
            global: Queue::new(),
            running: AtomicBool::new(true),
            active_tasks: AtomicUsize::new(0),
            cursor: AtomicUsize::new(0),
        }
    }

    pub(crate) fn all_queues_empty(&self) -> bool {
        self.global.is_empty() && self.workers.iter().all(|w| w.queue.is_empty())
    }

    pub(crate) fn quiescent(&self) -> bool {
        self.active_tasks.load(Ordering::Acquire) == 0 && self.all_queues_empty()
    }

    /// Routes a task to a worker queue: round-robin start, bounded scan
    /// for a shorter neighbour, overflow to the global queue past the
    /// soft cap.
    pub(crate) fn dispatch(&self, task: Task) {
        let n = self.workers.len();
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % n;
        let mut target = start;
        let mut best_len = self.workers[start].queue.len();
        for off in 1..=DISPATCH_SCAN.min(n - 1) {
            let idx = (start + off) % n;
            let len = self.workers[idx].queue.len();
            if len < best_len {
                target = idx;
                best_len = len;
            }
        }
        if best_len > LOCAL_SOFT_CAP {
            self.global.push(task);
        } else {
            self.workers[target].queue.push(task);
        }
    }
}

/// The body of every worker thread.
///
/// Sources are tried in order: own queue, global queue, one steal
/// attempt. On failure the worker descends the back-off ladder; on any
/// success the ladder resets and the idle flag clears.
pub(crate) fn worker_loop(shared: Arc<Shared>, index: usize) {
    let rng = FastRand::seeded();
    let me = &shared.workers[index];
    let mut failures: u32 = 0;

    loop {
        let task = me
            .queue
            .try_pop()
            .or_else(|| shared.global.try_pop())
            .or_else(|| try_steal(&shared, index, &rng));

        match task {
            Some(task) => {
                failures = 0;
                me.idle.store(false, Ordering::Relaxed);
                if task.is_sentinel() {
                    if !shared.running.load(Ordering::Acquire) {
                        break;
                    }
                    continue;
                }
                task.run();
                me.executed.fetch_add(1, Ordering::Relaxed);
                shared.active_tasks.fetch_sub(1, Ordering::AcqRel);
            }
            None => {
                if !shared.running.load(Ordering::Acquire) && shared.all_queues_empty() {
                    break;
                }
                failures = failures.saturating_add(1);
                if failures <= SPIN_LIMIT {
                    thread::yield_now();
                } else if failures <= NAP_LIMIT {
                    thread::sleep(NAP);
                } else {
                    me.idle.store(true, Ordering::Relaxed);
                    thread::sleep(SLEEP);
                }
            }
        }
    }
}

/// One steal attempt from a uniformly random victim other than the
/// thief. Stealing is disabled for single-worker pools.
fn try_steal(shared: &Shared, thief: usize, rng: &FastRand) -> Option<Task> {
    let n = shared.workers.len();
    if n < 2 {
        return None;
    }
    let mut victim = rng.fastrand_n((n - 1) as u32) as usize;
    if victim >= thief {
        victim += 1;
    }
    shared.workers[victim].queue.try_pop()
}
