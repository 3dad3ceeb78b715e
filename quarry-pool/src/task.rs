//! The type-erased unit of work flowing through the pool's queues.

/// Boxed callable; the queues carry one uniform task type no matter what
/// the submitted closure returns.
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// A queued unit of work.
///
/// A task without a job is the shutdown sentinel: it wakes a sleeping
/// worker so the worker re-checks its termination condition.
pub(crate) struct Task {
    job: Option<Job>,
    cancel: Option<Job>,
}

impl Task {
    pub(crate) fn new(job: Job, cancel: Job) -> Self {
        Self {
            job: Some(job),
            cancel: Some(cancel),
        }
    }

    pub(crate) fn sentinel() -> Self {
        Self {
            job: None,
            cancel: None,
        }
    }

    pub(crate) fn is_sentinel(&self) -> bool {
        self.job.is_none()
    }

    /// Executes the job. Panic containment lives inside the job closure,
    /// so this never unwinds into the worker.
    pub(crate) fn run(mut self) {
        if let Some(job) = self.job.take() {
            job();
        }
    }

    /// Resolves the task's completion as cancelled without running it.
    pub(crate) fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        // A task discarded without running still resolves its completion.
        // Completions are single-shot, so after a normal run this is a
        // no-op.
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}
