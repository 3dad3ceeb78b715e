//! Unbounded lock-free MPMC FIFO queue.
//!
//! A singly-linked list with a sentinel node: `head` is the dequeue side,
//! `tail` the enqueue side. Push swings `tail` to the new node with a
//! single atomic swap and then links the predecessor, so producers never
//! loop. Pop is a hazard-protected CAS on `head`; the unlinked node (the
//! previous sentinel) is retired to the reclamation system rather than
//! freed in place.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicIsize, Ordering};

use crossbeam_utils::{Backoff, CachePadded};
use quarry::{pin, retire, Atomic};

struct Node<T> {
    next: Atomic<Node<T>>,
    /// Unused in sentinels; consumed exactly once when the node's value
    /// is popped, after which the node itself becomes the sentinel.
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Node<T> {
    fn sentinel() -> *mut Self {
        Box::into_raw(Box::new(Self {
            next: Atomic::null(),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }))
    }

    fn with_value(value: T) -> *mut Self {
        Box::into_raw(Box::new(Self {
            next: Atomic::null(),
            value: UnsafeCell::new(MaybeUninit::new(value)),
        }))
    }
}

/// An unbounded multi-producer multi-consumer FIFO queue.
///
/// Per-producer FIFO order is preserved; across producers the order is
/// that of the tail swaps. `len` is advisory (see [`Queue::len`]).
///
/// # Examples
///
/// ```
/// use quarry_queue::Queue;
///
/// let q = Queue::new();
/// q.push(1);
/// q.push(2);
/// assert_eq!(q.try_pop(), Some(1));
/// assert_eq!(q.try_pop(), Some(2));
/// assert_eq!(q.try_pop(), None);
/// ```
pub struct Queue<T> {
    // Head and tail sit on their own cache lines so producers and
    // consumers do not false-share.
    head: CachePadded<Atomic<Node<T>>>,
    tail: CachePadded<Atomic<Node<T>>>,
    len: CachePadded<AtomicIsize>,
}

unsafe impl<T: Send> Send for Queue<T> {}
unsafe impl<T: Send> Sync for Queue<T> {}

impl<T: 'static> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Queue<T> {
    /// Creates an empty queue holding a single sentinel node.
    pub fn new() -> Queue<T> {
        let sentinel = Node::sentinel();
        Queue {
            head: CachePadded::new(Atomic::new(sentinel)),
            tail: CachePadded::new(Atomic::new(sentinel)),
            len: CachePadded::new(AtomicIsize::new(0)),
        }
    }

    /// Appends a value at the tail.
    pub fn push(&self, value: T) {
        let node = Node::with_value(value);
        let prev = self.tail.swap(node, Ordering::AcqRel);
        // `prev` cannot be reclaimed before this store: a node is only
        // retired after leaving the head position, which requires its
        // next pointer to be non-null — and only we set it.
        unsafe { (*prev).next.store(node, Ordering::Release) };
        self.len.fetch_add(1, Ordering::Relaxed);
    }

    /// Removes and returns the oldest value, or `None` when the queue is
    /// observed empty.
    ///
    /// A push whose tail swap has happened but whose predecessor link is
    /// not yet visible counts as "not there yet": the pop reports empty
    /// rather than spinning on the producer.
    pub fn try_pop(&self) -> Option<T> {
        let head_guard = pin();
        let next_guard = pin();
        let backoff = Backoff::new();

        loop {
            let head = head_guard.protect(&self.head);
            // SAFETY: `head` is hazard-protected and head is never null.
            let next = unsafe { head.deref() }.next.load(Ordering::Acquire);
            next_guard.publish(next);
            // The successor hazard is only valid while `head` is still the
            // sentinel: a node is retired only after leaving the head
            // position, so head unchanged means `next` was not retired
            // when we published.
            if self.head.load(Ordering::Acquire) != head.as_raw() {
                backoff.spin();
                continue;
            }
            if next.is_null() {
                return None;
            }
            match self.head.compare_exchange(
                head.as_raw(),
                next,
                Ordering::Release,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    // SAFETY: we won the CAS, so we are the only popper
                    // reading this value slot; `next` is protected by the
                    // successor hazard.
                    let value = unsafe { (*(*next).value.get()).assume_init_read() };
                    self.len.fetch_sub(1, Ordering::Relaxed);
                    head_guard.clear();
                    // SAFETY: the old sentinel is unlinked and its value
                    // slot was never initialized or already consumed.
                    unsafe { retire(head.as_raw()) };
                    return Some(value);
                }
                Err(_) => {
                    backoff.spin();
                }
            }
        }
    }

    /// Advisory number of values in the queue.
    ///
    /// Concurrent pushes and pops can make this momentarily stale in
    /// either direction; callers that need exact emptiness must rely on
    /// [`Queue::try_pop`] instead.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed).max(0) as usize
    }

    /// Advisory emptiness check, with the same tolerance as [`Queue::len`].
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discards every queued value.
    ///
    /// Callers must guarantee no concurrent producers or consumers; the
    /// detached nodes are freed in place rather than retired.
    pub fn clear(&self) {
        let sentinel = Node::sentinel();
        let old_head = self.head.swap(sentinel, Ordering::AcqRel);
        self.tail.swap(sentinel, Ordering::AcqRel);
        self.len.store(0, Ordering::Relaxed);
        // SAFETY: per the precondition the detached chain is unreachable
        // by any other thread.
        unsafe { free_chain(old_head) };
    }
}

/// Frees a detached node chain, dropping the values of every node after
/// the leading sentinel.
///
/// # Safety
///
/// The chain must be unreachable from any other thread and the leading
/// node's value slot must be unused.
unsafe fn free_chain<T>(head: *mut Node<T>) {
    let mut curr = head;
    let mut is_sentinel = true;
    while !curr.is_null() {
        // SAFETY: exclusive access per the caller contract.
        let next = unsafe { (*curr).next.load(Ordering::Relaxed) };
        if !is_sentinel {
            // SAFETY: every node after the sentinel holds an unconsumed
            // value.
            unsafe { (*(*curr).value.get()).assume_init_drop() };
        }
        is_sentinel = false;
        // SAFETY: nodes are allocated with `Box::into_raw` and freed once.
        drop(unsafe { Box::from_raw(curr) });
        curr = next;
    }
}

impl<T> Drop for Queue<T> {
    fn drop(&mut self) {
        let head = self.head.load(Ordering::Relaxed);
        // SAFETY: `&mut self` means no concurrent users; documented
        // precondition requires poppers to have quiesced, so no hazard
        // still covers these nodes.
        unsafe { free_chain(head) };
        // Old sentinels retired by this thread's pops can go now too.
        quarry::reclaim_pending();
    }
}
