//! Core engine: tasks, contexts, the priority queue, resources, the executor
//! and the scheduler.

pub mod context;
pub mod error;
pub mod executor;
pub mod mailbox;
pub mod priority_queue;
pub mod resource;
pub mod scheduler;
pub mod task;

pub use context::Context;
pub use error::{
    AppResult, ContextError, EngineError, ExecutorError, MailboxError, ResourceError, SchedulerError,
    TaskError,
};
pub use executor::{Executor, ExecutorPhase, ExecutorStats};
pub use mailbox::{Mailbox, TaskReport};
pub use priority_queue::PriorityQueue;
pub use resource::{Allocation, Resource, ResourceManager, Semaphore};
pub use scheduler::Scheduler;
pub use task::{Priority, Task, TaskBody, TaskState};
