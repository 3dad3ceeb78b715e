//! Hazard slot registry.
//!
//! Slots are lazily allocated, pushed onto a global singly-linked list and
//! never unlinked. A slot's address therefore stays stable for the process
//! lifetime, which keeps the reclamation scan a plain list walk. When a
//! thread exits its slots are released (owner cleared, marked inactive) and
//! may be claimed by a later thread.

use crate::retired::Retired;
use core::sync::atomic::{AtomicBool, AtomicPtr, AtomicU64, AtomicUsize, Ordering};
use once_cell::race::OnceBox;
use std::ptr;
use std::sync::Mutex;

/// A single hazard publication slot.
///
/// While a thread owns a slot, the pointer stored in `ptr` is treated as
/// live by every reclamation scan: no retired node with that address will
/// be freed.
pub struct HazardSlot {
    /// The currently published hazard, null when nothing is protected.
    pub(crate) ptr: AtomicPtr<u8>,
    /// Identity of the owning thread, 0 while the slot is free.
    owner: AtomicU64,
    /// True while some thread owns the slot.
    active: AtomicBool,
    /// Next slot in the global list. Written once before the slot becomes
    /// reachable, immutable afterwards.
    next: AtomicPtr<HazardSlot>,
}

impl HazardSlot {
    fn new(owner: u64) -> Self {
        Self {
            ptr: AtomicPtr::new(ptr::null_mut()),
            owner: AtomicU64::new(owner),
            active: AtomicBool::new(true),
            next: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Clears the publication and returns the slot to the free pool.
    pub(crate) fn release(&self) {
        self.ptr.store(ptr::null_mut(), Ordering::Release);
        self.active.store(false, Ordering::Release);
        self.owner.store(0, Ordering::Release);
    }
}

/// Global slot list plus the orphaned retirements of exited threads.
pub(crate) struct Registry {
    head: AtomicPtr<HazardSlot>,
    len: AtomicUsize,
    /// Retired nodes whose owning thread exited before they became
    /// reclaimable. Adopted by the next scan on any thread.
    orphans: Mutex<Vec<Retired>>,
}

impl Registry {
    fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
            len: AtomicUsize::new(0),
            orphans: Mutex::new(Vec::new()),
        }
    }

    /// Claims a slot for `owner`: first by recycling a released slot,
    /// otherwise by allocating a fresh one and pushing it at the head.
    pub(crate) fn acquire(&self, owner: u64) -> &'static HazardSlot {
        let mut curr = self.head.load(Ordering::Acquire);
        while !curr.is_null() {
            // SAFETY: slots are leaked, so every pointer ever linked into
            // the list stays valid.
            let slot = unsafe { &*curr };
            if !slot.active.load(Ordering::Relaxed)
                && slot
                    .owner
                    .compare_exchange(0, owner, Ordering::AcqRel, Ordering::Relaxed)
                    .is_ok()
            {
                slot.active.store(true, Ordering::Release);
                return slot;
            }
            curr = slot.next.load(Ordering::Relaxed);
        }

        let slot: &'static HazardSlot = Box::leak(Box::new(HazardSlot::new(owner)));
        self.len.fetch_add(1, Ordering::Relaxed);
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            slot.next.store(head, Ordering::Relaxed);
            match self
                .head
                .compare_exchange_weak(head, slot as *const _ as *mut _, Ordering::Release, Ordering::Acquire)
            {
                Ok(_) => return slot,
                Err(h) => head = h,
            }
        }
    }

    /// Number of slots ever allocated. Drives the retire-scan threshold.
    pub(crate) fn slot_count(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Collects every published hazard into `out`, sorted for binary search.
    pub(crate) fn snapshot_hazards(&self, out: &mut Vec<*mut u8>) {
        out.clear();
        let mut curr = self.head.load(Ordering::Acquire);
        while !curr.is_null() {
            // SAFETY: see `acquire`, list nodes are never freed.
            let slot = unsafe { &*curr };
            if slot.active.load(Ordering::Acquire) {
                let p = slot.ptr.load(Ordering::Acquire);
                if !p.is_null() {
                    out.push(p);
                }
            }
            curr = slot.next.load(Ordering::Relaxed);
        }
        out.sort_unstable();
    }

    /// Hands the leftovers of an exiting thread to the registry.
    pub(crate) fn add_orphans(&self, mut nodes: Vec<Retired>) {
        if nodes.is_empty() {
            return;
        }
        let mut orphans = self.orphans.lock().unwrap();
        orphans.append(&mut nodes);
    }

    /// Adopts all orphaned retirements into the caller's list.
    pub(crate) fn take_orphans(&self, into: &mut Vec<Retired>) {
        let mut orphans = self.orphans.lock().unwrap();
        into.append(&mut orphans);
    }
}

/// Global singleton instance
static GLOBAL: OnceBox<Registry> = OnceBox::new();

/// Get reference to the global slot registry
#[inline]
pub(crate) fn registry() -> &'static Registry {
    GLOBAL.get_or_init(|| Box::new(Registry::new()))
}

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

std::thread_local! {
    static THREAD_ID: u64 = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
}

/// Identity of the calling thread as used in slot ownership.
pub(crate) fn current_thread_id() -> u64 {
    THREAD_ID.with(|id| *id)
}
