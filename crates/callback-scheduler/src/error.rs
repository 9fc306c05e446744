//! Scheduler errors

/// Errors returned by [`Scheduler::try_schedule`](crate::Scheduler::try_schedule)
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Shutdown has begun; the task was not accepted
    #[error("Scheduler is shut down")]
    ShutDown,

    /// The worker thread exited after a callback panicked
    #[error("Scheduler worker has stopped")]
    WorkerStopped,

    /// The worker thread could not be spawned
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Result alias for fallible scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
