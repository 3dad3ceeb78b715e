//! Lock-free queue primitives built on quarry's hazard-pointer
//! reclamation.
//!
//! ## Features
//!
//! - [`Queue`]: unbounded MPMC FIFO queue (linked list with sentinel).
//! - [`VersionedQueue`]: the same queue with per-entry version tags.
//!
//! ## Usage
//!
//! ```rust
//! use quarry_queue::Queue;
//!
//! let q = Queue::new();
//! for i in 0..3 {
//!     q.push(i);
//! }
//! assert_eq!(q.try_pop(), Some(0));
//! assert_eq!(q.len(), 2);
//! ```

mod queue;
mod versioned;

pub use queue::Queue;
pub use versioned::VersionedQueue;
