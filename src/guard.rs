//! Guards: RAII hazard-slot claims and the publish/validate protocol.

use crate::atomic::{Atomic, Shared};
use crate::retired::RetiredList;
use crate::slot::{current_thread_id, registry, HazardSlot};
use core::marker::PhantomData;
use core::sync::atomic::Ordering;
use std::cell::RefCell;
use std::ptr;

/// Per-thread slot cache and retirement list.
///
/// Claimed slots are kept across guard lifetimes so that repeated `pin`
/// calls are a vector pop rather than a registry walk. On thread exit all
/// slots are released and the remaining retirements are scanned, with
/// stubborn survivors handed to the global registry.
struct LocalContext {
    free: RefCell<Vec<&'static HazardSlot>>,
    owned: RefCell<Vec<&'static HazardSlot>>,
    retired: RefCell<RetiredList>,
}

impl LocalContext {
    fn new() -> Self {
        Self {
            free: RefCell::new(Vec::new()),
            owned: RefCell::new(Vec::new()),
            retired: RefCell::new(RetiredList::new()),
        }
    }

    fn checkout(&self) -> &'static HazardSlot {
        if let Some(slot) = self.free.borrow_mut().pop() {
            return slot;
        }
        let slot = registry().acquire(current_thread_id());
        self.owned.borrow_mut().push(slot);
        slot
    }

    fn checkin(&self, slot: &'static HazardSlot) {
        self.free.borrow_mut().push(slot);
    }
}

impl Drop for LocalContext {
    fn drop(&mut self) {
        let mut retired = self.retired.borrow_mut();
        // Our own slots must stop protecting anything before the final
        // scan, otherwise this thread's hazards pin its own garbage.
        for slot in self.owned.borrow_mut().drain(..) {
            slot.release();
        }
        retired.scan();
        if !retired.is_empty() {
            registry().add_orphans(retired.take_all());
        }
    }
}

std::thread_local! {
    static LOCAL: LocalContext = LocalContext::new();
}

/// An RAII claim on a hazard slot.
///
/// While the guard lives, any pointer it has published via
/// [`Guard::protect`] or [`Guard::publish`] is excluded from reclamation.
/// Dropping the guard unpublishes and returns the slot to the thread's
/// cache.
pub struct Guard {
    slot: &'static HazardSlot,
    // Slots return to the cache of the thread that checked them out.
    _not_send: PhantomData<*mut ()>,
}

/// Claims a hazard slot for the calling thread.
///
/// # Examples
///
/// ```
/// use quarry::{pin, Atomic};
/// use std::sync::atomic::Ordering;
///
/// let atomic = Atomic::new(Box::into_raw(Box::new(7)));
/// let guard = pin();
/// let shared = guard.protect(&atomic);
/// assert_eq!(unsafe { *shared.deref() }, 7);
/// drop(guard);
/// # unsafe { drop(Box::from_raw(atomic.load(Ordering::Relaxed))) };
/// ```
#[inline]
pub fn pin() -> Guard {
    let slot = LOCAL.with(|local| local.checkout());
    Guard {
        slot,
        _not_send: PhantomData,
    }
}

impl Guard {
    /// Loads from `src` and publishes the result as a hazard.
    ///
    /// The pointer is published with release ordering and the source is
    /// re-read with acquire ordering until both reads agree; only then is
    /// the pointer safe to dereference for the guard's lifetime.
    pub fn protect<'g, T>(&'g self, src: &Atomic<T>) -> Shared<'g, T> {
        let mut ptr = src.load(Ordering::Acquire);
        loop {
            self.slot.ptr.store(ptr.cast(), Ordering::Release);
            let reread = src.load(Ordering::Acquire);
            if reread == ptr {
                // SAFETY: the published hazard now matches the source, so
                // no scan that started after the publication frees `ptr`.
                return unsafe { Shared::from_raw(ptr) };
            }
            ptr = reread;
        }
    }

    /// Publishes a pointer obtained elsewhere.
    ///
    /// The caller must re-validate the pointer's source after this call
    /// before dereferencing, exactly as [`Guard::protect`] does
    /// internally.
    #[inline]
    pub fn publish<T>(&self, ptr: *mut T) {
        self.slot.ptr.store(ptr.cast(), Ordering::Release);
    }

    /// Unpublishes without releasing the slot.
    #[inline]
    pub fn clear(&self) {
        self.slot.ptr.store(ptr::null_mut(), Ordering::Release);
    }
}

impl Drop for Guard {
    fn drop(&mut self) {
        self.slot.ptr.store(ptr::null_mut(), Ordering::Release);
        // During thread teardown the cache may already be gone; release
        // the slot to the registry instead.
        if LOCAL.try_with(|local| local.checkin(self.slot)).is_err() {
            self.slot.release();
        }
    }
}

/// Retires a node for deferred reclamation.
///
/// The node is freed as `Box<T>` once no hazard slot publishes its
/// address.
///
/// # Safety
///
/// `ptr` must come from `Box::into_raw`, must be unreachable from shared
/// state, and must not be retired twice.
#[inline]
pub unsafe fn retire<T>(ptr: *mut T) {
    unsafe fn drop_box<T>(p: *mut u8) {
        // SAFETY: `p` was created from `Box::into_raw::<T>` and the
        // reclamation scan calls each deleter exactly once.
        unsafe { drop(Box::from_raw(p.cast::<T>())) };
    }
    // SAFETY: forwarded from the caller.
    unsafe { retire_with(ptr.cast(), drop_box::<T>) };
}

/// Retires a node with an explicit deleter.
///
/// # Safety
///
/// Same contract as [`retire`]; additionally `drop_fn` must be safe to
/// call once on `ptr`.
pub unsafe fn retire_with(ptr: *mut u8, drop_fn: unsafe fn(*mut u8)) {
    LOCAL.with(|local| local.retired.borrow_mut().retire(ptr, drop_fn));
}

/// Forces a reclamation scan of the calling thread's retired nodes.
///
/// Returns the number of nodes freed. Useful in destructors and tests;
/// ordinary callers can rely on the automatic threshold scan.
pub fn reclaim_pending() -> usize {
    LOCAL
        .try_with(|local| local.retired.borrow_mut().scan())
        .unwrap_or(0)
}
