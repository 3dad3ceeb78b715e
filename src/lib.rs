//! Quarry: hazard-pointer memory reclamation for lock-free data structures.
//!
//! Threads that dereference shared nodes publish the node's address in a
//! *hazard slot* before touching it; threads that unlink nodes *retire*
//! them instead of freeing, and a periodic scan frees every retired node
//! whose address no slot publishes.
//!
//! # Key pieces
//!
//! - **Slots**: a global, never-shrinking list of publication slots,
//!   claimed per thread and recycled after thread exit.
//! - **Guards**: RAII slot claims; [`Guard::protect`] runs the mandatory
//!   publish-then-revalidate loop.
//! - **Retirement**: thread-local deferred-free lists with a threshold
//!   scan (twice the slot count, floor of eight).
//!
//! # Example
//!
//! ```
//! use quarry::{pin, retire, Atomic};
//! use std::sync::atomic::Ordering;
//!
//! let atomic = Atomic::new(Box::into_raw(Box::new(42)));
//!
//! let guard = pin();
//! let shared = guard.protect(&atomic);
//! assert_eq!(unsafe { *shared.deref() }, 42);
//! drop(guard);
//!
//! // Unlink, then hand the node to the reclamation system.
//! let old = atomic.swap(std::ptr::null_mut(), Ordering::AcqRel);
//! unsafe { retire(old) };
//! ```

#![warn(missing_docs)]

mod atomic;
mod guard;
mod retired;
mod slot;

pub use atomic::{Atomic, Shared};
pub use guard::{pin, reclaim_pending, retire, retire_with, Guard};
pub use slot::HazardSlot;

// Re-export for convenience
pub use core::sync::atomic::Ordering;
