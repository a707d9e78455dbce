//! Error types for task, resource, executor and scheduler operations.

use thiserror::Error;

/// Reason a [`Context`](crate::core::Context) finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    /// The context (or one of its ancestors) was canceled explicitly.
    #[error("context canceled")]
    Canceled,
    /// The context deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Errors produced by resources and the resource registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// Every unit of the resource is currently held.
    #[error("resource exhausted: all {capacity} units are held")]
    Exhausted {
        /// Capacity of the exhausted resource.
        capacity: u32,
    },
    /// A release was attempted while no unit was held.
    #[error("resource over-release: no units are held")]
    OverRelease,
    /// No resource is registered under the name.
    #[error("resource not found: {0}")]
    NotFound(String),
    /// A resource is already registered under the name.
    #[error("resource already registered: {0}")]
    AlreadyRegistered(String),
}

/// Errors produced by executing a task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The task has no work function.
    #[error("invalid task: task function is empty")]
    InvalidTask,
    /// The task was canceled before or while running.
    #[error("task canceled")]
    Canceled,
    /// The execution context deadline passed before the task finished.
    #[error("task deadline exceeded")]
    DeadlineExceeded,
    /// The task already left the created state; tasks run at most once.
    #[error("task {0} already started")]
    AlreadyStarted(String),
    /// The executor refused the task because it is shutting down.
    #[error("task {0} rejected: executor is shutting down")]
    Rejected(String),
    /// A resource operation performed by the task body failed.
    #[error(transparent)]
    Resource(#[from] ResourceError),
    /// The task body panicked.
    #[error("task panicked: {0}")]
    Panicked(String),
    /// The task body reported a failure.
    #[error("task failed: {0}")]
    Failed(String),
}

impl TaskError {
    /// Build a [`TaskError::Failed`] from any displayable error.
    pub fn failed(err: impl std::fmt::Display) -> Self {
        Self::Failed(err.to_string())
    }

    /// Whether this error means the task was canceled or timed out.
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Canceled | Self::DeadlineExceeded)
    }
}

impl From<ContextError> for TaskError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Canceled => Self::Canceled,
            ContextError::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(err: anyhow::Error) -> Self {
        Self::Failed(format!("{err:#}"))
    }
}

/// Errors produced by the executor lifecycle and intake.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The executor configuration is unusable.
    #[error("invalid executor configuration: {0}")]
    InvalidConfig(String),
    /// `start` was called on an executor that already left the idle state.
    #[error("executor already started")]
    AlreadyStarted,
    /// The executor has not been started yet.
    #[error("executor is not running")]
    NotRunning,
    /// The executor is stopping or stopped and accepts no new work.
    #[error("executor is shutting down")]
    ShuttingDown,
    /// A worker thread or its runtime could not be created.
    #[error("failed to spawn worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Errors produced by mailbox backends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MailboxError {
    /// The receiving side of the mailbox is gone.
    #[error("mailbox closed")]
    Closed,
    /// The backend refused the report.
    #[error("mailbox rejected report: {0}")]
    Rejected(String),
}

/// Errors produced by the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The scheduler is stopping or stopped and accepts no new tasks.
    #[error("scheduler is shutting down")]
    ShuttingDown,
    /// The underlying executor failed.
    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

/// Errors produced while building or driving a whole engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A scheduler operation failed.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    /// A resource registry operation failed.
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

impl From<ExecutorError> for EngineError {
    fn from(err: ExecutorError) -> Self {
        Self::Scheduler(SchedulerError::Executor(err))
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
