use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RtosError {
    #[error("timed out")]
    Timeout,
    #[error("no free task slot")]
    NoFreeSlot,
    #[error("invalid priority {0}")]
    InvalidPriority(usize),
    #[error("stack of {0} bytes is too small")]
    StackTooSmall(usize),
    #[error("task handle is stale")]
    InvalidTask,
    #[error("scheduler is not running")]
    NotRunning,
    #[error("caller does not own the mutex")]
    NotOwner,
    #[error("semaphore is already at its maximum count")]
    SemaphoreFull,
    #[error("deferred call queue is full")]
    QueueFull,
    #[error("task already has a pending notification")]
    NotificationPending,
    #[error("scheduler already started")]
    AlreadyStarted,
}
