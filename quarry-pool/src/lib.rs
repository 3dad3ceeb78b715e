//! A work-stealing thread pool built on lock-free MPMC queues.
//!
//! Each worker owns a `quarry_queue::Queue` as its local queue; a shared
//! global queue takes overflow and doubles as a dispatch fallback.
//! Workers drain their own queue first, then the global queue, then
//! steal from a random peer, backing off when everything is dry.
//!
//! # Example
//!
//! ```
//! use quarry_pool::{PoolError, ThreadPool};
//!
//! let pool = ThreadPool::new(4);
//!
//! let ok = pool.submit(|| 1 + 1).unwrap();
//! let boom = pool.submit(|| -> i32 { panic!("boom") }).unwrap();
//!
//! assert_eq!(ok.get(), Ok(2));
//! assert_eq!(boom.get(), Err(PoolError::TaskFailed("boom".into())));
//!
//! pool.shutdown();
//! assert!(pool.submit(|| 0).is_err());
//! ```
//!
//! Diagnostics from the shutdown path are emitted through `tracing` and
//! can be compiled out by disabling the `log` cargo feature.

#![warn(missing_docs)]

#[macro_use]
mod macros;

mod completion;
mod error;
mod pool;
mod rand;
mod task;
mod worker;

pub use completion::Completion;
pub use error::{PoolError, WaitStatus};
pub use pool::ThreadPool;
