//! Outcome delivery for executed tasks.

use serde::Serialize;

use crate::core::error::{MailboxError, TaskError};
use crate::core::task::{Priority, Task, TaskState};
use crate::util::clock::now_ms;

/// What happened to one executed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskReport {
    /// Task identifier.
    pub task_id: String,
    /// Priority at the time the task finished.
    pub priority: Priority,
    /// Task state after execution.
    pub state: TaskState,
    /// Error returned by the execution, if any.
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<TaskError>,
    /// Milliseconds since the Unix epoch when the report was built.
    pub finished_at_ms: u128,
}

impl TaskReport {
    /// Build a report from a task and the result its execution returned.
    #[must_use]
    pub fn new(task: &Task, result: &Result<(), TaskError>) -> Self {
        Self {
            task_id: task.id().to_string(),
            priority: task.priority(),
            state: task.state(),
            error: result.as_ref().err().cloned(),
            finished_at_ms: now_ms(),
        }
    }

    /// Whether the execution returned `Ok`.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

fn serialize_error<S: serde::Serializer>(error: &Option<TaskError>, serializer: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(err) => serializer.serialize_some(&err.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Sink receiving one [`TaskReport`] per executed task.
///
/// Called from worker threads right after execution, before the task stops
/// counting as in flight.
pub trait Mailbox: Send + Sync {
    /// Store or forward a report.
    ///
    /// # Errors
    ///
    /// Backend-specific; the executor logs the error and moves on.
    fn deliver(&self, report: TaskReport) -> Result<(), MailboxError>;
}
