use std::fmt;

/// Typed errors surfaced by the pool and its completion handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The pool no longer accepts work, or the task was cancelled because
    /// the pool shut down before running it.
    ShutDown,
    /// The task panicked; the payload is carried as text.
    TaskFailed(String),
    /// A deadline elapsed before the awaited condition held.
    Timeout,
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::ShutDown => write!(f, "thread pool is shut down"),
            PoolError::TaskFailed(message) => {
                write!(f, "task failed: {}", message)
            }
            PoolError::Timeout => write!(f, "timed out"),
        }
    }
}

impl std::error::Error for PoolError {}

/// Outcome of a bounded wait for pool quiescence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// Every credited task finished and all queues were observed empty.
    Quiesced,
    /// The deadline elapsed first; the pool keeps running.
    TimedOut,
}
