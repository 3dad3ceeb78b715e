//! Version-tagged queue wrapper.
//!
//! Pairs every enqueued value with a monotonically increasing tag drawn
//! from a per-queue counter. The tags make re-enqueued values
//! distinguishable from their earlier lives, which hardens callers that
//! compare popped values by identity; the underlying queue still relies
//! on hazard pointers for pointer-level safety.

use crate::queue::Queue;
use std::sync::atomic::{AtomicU64, Ordering};

/// An MPMC FIFO queue whose entries carry unique version tags.
///
/// Exposes the same contract as [`Queue`]; the tag is an implementation
/// aid surfaced only through [`VersionedQueue::try_pop_versioned`].
///
/// # Examples
///
/// ```
/// use quarry_queue::VersionedQueue;
///
/// let q = VersionedQueue::new();
/// q.push("a");
/// q.push("b");
/// assert_eq!(q.try_pop(), Some("a"));
/// let (value, version) = q.try_pop_versioned().unwrap();
/// assert_eq!(value, "b");
/// assert_eq!(version, 1);
/// ```
pub struct VersionedQueue<T: 'static> {
    inner: Queue<(T, u64)>,
    counter: AtomicU64,
}

impl<T: 'static> Default for VersionedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> VersionedQueue<T> {
    /// Creates an empty queue with the version counter at zero.
    pub fn new() -> Self {
        Self {
            inner: Queue::new(),
            counter: AtomicU64::new(0),
        }
    }

    /// Appends a value, tagging it with the next version.
    pub fn push(&self, value: T) {
        let version = self.counter.fetch_add(1, Ordering::Relaxed);
        self.inner.push((value, version));
    }

    /// Removes and returns the oldest value.
    pub fn try_pop(&self) -> Option<T> {
        self.inner.try_pop().map(|(value, _)| value)
    }

    /// Removes and returns the oldest value together with its tag.
    pub fn try_pop_versioned(&self) -> Option<(T, u64)> {
        self.inner.try_pop()
    }

    /// Advisory length, see [`Queue::len`].
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Advisory emptiness check, see [`Queue::is_empty`].
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Discards every queued value. Same precondition as [`Queue::clear`].
    pub fn clear(&self) {
        self.inner.clear();
    }
}
