//! One-shot completion handles.
//!
//! A completion is a single-writer, single-reader handoff: the worker (or
//! the shutdown path) resolves it exactly once, the submitting side reads
//! it at most once. Blocking readers park and are unparked by the writer.

use crate::error::PoolError;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, Thread};

const EMPTY: usize = 0;
const WRITING: usize = 1;
const READY: usize = 2;
const TAKEN: usize = 3;

pub(crate) struct Inner<R> {
    state: AtomicUsize,
    value: UnsafeCell<Option<Result<R, PoolError>>>,
    waiter: Mutex<Option<Thread>>,
}

// SAFETY: the state machine hands the value slot from the single winning
// writer (WRITING) to the single reader (READY); no two threads touch it
// concurrently.
unsafe impl<R: Send> Send for Inner<R> {}
unsafe impl<R: Send> Sync for Inner<R> {}

impl<R> Inner<R> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: AtomicUsize::new(EMPTY),
            value: UnsafeCell::new(None),
            waiter: Mutex::new(None),
        })
    }

    /// Resolves the completion. Only the first caller wins; later calls
    /// (a cancellation racing a normal finish) are no-ops.
    pub(crate) fn complete(&self, result: Result<R, PoolError>) {
        if self
            .state
            .compare_exchange(EMPTY, WRITING, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        // SAFETY: the WRITING state grants exclusive slot access.
        unsafe { *self.value.get() = Some(result) };
        self.state.store(READY, Ordering::Release);
        if let Some(waiter) = self.waiter.lock().unwrap().take() {
            waiter.unpark();
        }
    }

    fn is_ready(&self) -> bool {
        self.state.load(Ordering::Acquire) >= READY
    }

    /// Takes the outcome if resolved. The READY to TAKEN transition can
    /// only be won once, so the slot is drained by exactly one caller.
    fn try_take(&self) -> Option<Result<R, PoolError>> {
        if self
            .state
            .compare_exchange(READY, TAKEN, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return None;
        }
        // SAFETY: winning the transition makes us the single reader of a
        // slot the writer released at READY.
        let value = unsafe { (*self.value.get()).take() };
        Some(value.expect("completion resolved without a value"))
    }
}

/// The caller-facing handle for a submitted task's outcome.
///
/// Resolves to the task's return value, to
/// [`PoolError::TaskFailed`] when the task panicked, or to
/// [`PoolError::ShutDown`] when the pool was torn down before the task
/// ran.
pub struct Completion<R> {
    inner: Arc<Inner<R>>,
}

impl<R> Completion<R> {
    pub(crate) fn from_inner(inner: Arc<Inner<R>>) -> Self {
        Self { inner }
    }

    /// Non-blocking readiness test.
    pub fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    /// Takes the outcome without blocking.
    ///
    /// Returns `None` while the task is still pending, and on every call
    /// after the one that drained the value.
    pub fn try_get(&self) -> Option<Result<R, PoolError>> {
        self.inner.try_take()
    }

    /// Blocks until the task completes and returns its outcome.
    ///
    /// # Panics
    ///
    /// Panics if the outcome was already drained by
    /// [`Completion::try_get`].
    pub fn get(self) -> Result<R, PoolError> {
        while !self.inner.is_ready() {
            *self.inner.waiter.lock().unwrap() = Some(thread::current());
            // Re-check after registering, otherwise a writer that fired
            // in between would leave us parked forever.
            if self.inner.is_ready() {
                break;
            }
            thread::park();
        }
        self.inner
            .try_take()
            .expect("completion value already taken")
    }
}

impl<R> std::fmt::Debug for Completion<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("ready", &self.is_ready())
            .finish()
    }
}
