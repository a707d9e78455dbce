//! Task state machine: identity, priority, cancellation, dependencies and
//! one-shot completion signaling.

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::core::context::Context;
use crate::core::error::{ContextError, TaskError};
use crate::core::priority_queue::{PriorityQueue, QueueShared};

/// Priority tier of a task. Higher tiers dispatch first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Background work.
    Low,
    /// Default tier.
    #[default]
    Medium,
    /// Latency-sensitive work.
    High,
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Constructed, not yet executed.
    Created,
    /// Executing on a worker.
    Running,
    /// Body returned `Ok`.
    Completed,
    /// Body returned an error, panicked, or the task had no body.
    Failed,
    /// Canceled before or during execution, or its deadline passed.
    Canceled,
}

impl TaskState {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }

    fn from_outcome(outcome: &Result<(), TaskError>) -> Self {
        match outcome {
            Ok(()) => Self::Completed,
            Err(err) if err.is_cancellation() => Self::Canceled,
            Err(_) => Self::Failed,
        }
    }
}

/// The work performed by a task.
///
/// Bodies observe cancellation cooperatively through the [`Context`]; a body
/// that never checks it keeps its worker busy until it returns.
///
/// Closures of the shape `Fn(Context) -> impl Future<Output = Result<(), TaskError>>`
/// can be used directly through [`Task::new`].
#[async_trait]
pub trait TaskBody: Send + Sync + 'static {
    /// Run the body to completion.
    async fn run(&self, ctx: Context) -> Result<(), TaskError>;
}

struct FnBody<F>(F);

#[async_trait]
impl<F, Fut> TaskBody for FnBody<F>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    async fn run(&self, ctx: Context) -> Result<(), TaskError> {
        (self.0)(ctx).await
    }
}

struct Control {
    state: TaskState,
    cancel_requested: bool,
    context: Option<Context>,
    outcome: Option<Result<(), TaskError>>,
}

/// A unit of work with identity, priority, cancellation and completion signaling.
///
/// Tasks are shared as `Arc<Task>` between the submitter, the priority queue and
/// the executor intake. A task executes at most once.
pub struct Task {
    id: String,
    body: Option<Arc<dyn TaskBody>>,
    priority: Mutex<Priority>,
    dependencies: Mutex<Vec<Arc<Task>>>,
    /// Queue currently holding this task, used to route priority updates.
    membership: Mutex<Option<Weak<QueueShared>>>,
    control: Mutex<Control>,
    completed: Condvar,
    notify: Notify,
}

impl Task {
    /// Create a task running `body`.
    pub fn new<F, Fut>(id: impl Into<String>, priority: Priority, body: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Self::with_body(id, priority, FnBody(body))
    }

    /// Create a task with a generated UUID v4 identifier.
    pub fn anonymous<F, Fut>(priority: Priority, body: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Self::new(uuid::Uuid::new_v4().to_string(), priority, body)
    }

    /// Create a task from a [`TaskBody`] implementation.
    pub fn with_body(id: impl Into<String>, priority: Priority, body: impl TaskBody) -> Self {
        Self::from_parts(id.into(), priority, Some(Arc::new(body)))
    }

    /// Create a task without a work function. Executing it fails with
    /// [`TaskError::InvalidTask`].
    pub fn without_body(id: impl Into<String>, priority: Priority) -> Self {
        Self::from_parts(id.into(), priority, None)
    }

    fn from_parts(id: String, priority: Priority, body: Option<Arc<dyn TaskBody>>) -> Self {
        Self {
            id,
            body,
            priority: Mutex::new(priority),
            dependencies: Mutex::new(Vec::new()),
            membership: Mutex::new(None),
            control: Mutex::new(Control {
                state: TaskState::Created,
                cancel_requested: false,
                context: None,
                outcome: None,
            }),
            completed: Condvar::new(),
            notify: Notify::new(),
        }
    }

    /// Task identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current priority.
    #[must_use]
    pub fn priority(&self) -> Priority {
        *self.priority.lock()
    }

    /// Replace the priority. If the task sits in a priority queue, the queue
    /// re-balances itself in the same step.
    pub fn set_priority(&self, priority: Priority) {
        let queue = self.membership.lock().as_ref().and_then(Weak::upgrade);
        match queue {
            Some(shared) => PriorityQueue::from_shared(shared).update_priority(self, priority),
            None => self.store_priority(priority),
        }
    }

    pub(crate) fn store_priority(&self, priority: Priority) {
        *self.priority.lock() = priority;
    }

    pub(crate) fn attach_queue(&self, queue: Weak<QueueShared>) {
        *self.membership.lock() = Some(queue);
    }

    pub(crate) fn detach_queue(&self) {
        *self.membership.lock() = None;
    }

    /// Append a prerequisite. Duplicates are kept.
    pub fn add_dependency(&self, dependency: Arc<Self>) {
        self.dependencies.lock().push(dependency);
    }

    /// Remove the first occurrence of `dependency`, matched by identity.
    /// Returns whether anything was removed.
    pub fn remove_dependency(&self, dependency: &Arc<Self>) -> bool {
        let mut deps = self.dependencies.lock();
        match deps.iter().position(|d| Arc::ptr_eq(d, dependency)) {
            Some(idx) => {
                deps.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Snapshot of the prerequisites in insertion order.
    #[must_use]
    pub fn dependencies(&self) -> Vec<Arc<Self>> {
        self.dependencies.lock().clone()
    }

    /// Whether every prerequisite has completed successfully.
    ///
    /// Dispatch does not consult this; it is exposed for callers that gate
    /// submission on their own.
    #[must_use]
    pub fn dependencies_satisfied(&self) -> bool {
        self.dependencies
            .lock()
            .iter()
            .all(|d| d.state() == TaskState::Completed)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TaskState {
        self.control.lock().state
    }

    /// Whether the task reached a terminal state.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// Final result once the task finished.
    #[must_use]
    pub fn outcome(&self) -> Option<Result<(), TaskError>> {
        self.control.lock().outcome.clone()
    }

    /// Execute the task under a child of `ctx`.
    ///
    /// The body runs as its own tokio task and races the child context. When
    /// cancellation wins, the body is still awaited before completion is
    /// signaled, so nothing it does outlives this call. Must be called from
    /// within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`TaskError::InvalidTask`] if the task has no body
    /// - [`TaskError::Canceled`] / [`TaskError::DeadlineExceeded`] if the context
    ///   finished first, including a cancel requested before execution
    /// - [`TaskError::AlreadyStarted`] if the task was executed before
    /// - whatever the body returned
    pub async fn execute(&self, ctx: &Context) -> Result<(), TaskError> {
        let ctx = ctx.child();
        {
            let mut control = self.control.lock();
            if control.state != TaskState::Created {
                return Err(TaskError::AlreadyStarted(self.id.clone()));
            }
            if control.cancel_requested {
                ctx.cancel();
            }
            control.state = TaskState::Running;
            control.context = Some(ctx.clone());
        }

        let outcome = self.run_body(&ctx).await;
        self.finish(outcome.clone());
        outcome
    }

    async fn run_body(&self, ctx: &Context) -> Result<(), TaskError> {
        let Some(body) = self.body.clone() else {
            return Err(TaskError::InvalidTask);
        };
        if let Some(err) = ctx.err() {
            debug!(task_id = %self.id, "task finished before its body started");
            return Err(err.into());
        }

        let body_ctx = ctx.clone();
        let mut handle = tokio::spawn(async move { body.run(body_ctx).await });

        tokio::select! {
            biased;
            joined = &mut handle => self.flatten(joined),
            err = ctx.done() => {
                debug!(task_id = %self.id, reason = %err, "context finished first, joining body");
                if let Err(join_err) = (&mut handle).await {
                    warn!(task_id = %self.id, error = %join_err, "task body ended abnormally after cancellation");
                }
                Err(err.into())
            }
        }
    }

    fn flatten(&self, joined: Result<Result<(), TaskError>, tokio::task::JoinError>) -> Result<(), TaskError> {
        match joined {
            Ok(result) => result,
            Err(join_err) if join_err.is_panic() => {
                let payload = join_err.into_panic();
                let message = payload
                    .downcast_ref::<&str>()
                    .map(ToString::to_string)
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                warn!(task_id = %self.id, panic = %message, "task body panicked");
                Err(TaskError::Panicked(message))
            }
            Err(_) => Err(TaskError::Canceled),
        }
    }

    /// Cancel the task. Idempotent.
    ///
    /// While running, the execution context is canceled. Before execution the
    /// request is remembered and `execute` resolves as canceled without running
    /// the body. After completion this does nothing.
    pub fn cancel(&self) {
        let ctx = {
            let mut control = self.control.lock();
            match control.state {
                TaskState::Created => {
                    control.cancel_requested = true;
                    None
                }
                TaskState::Running => control.context.clone(),
                _ => None,
            }
        };
        if let Some(ctx) = ctx {
            ctx.cancel();
        }
    }

    /// Finish a task that will never run, releasing its waiters. Only applies
    /// to tasks still in the created state.
    pub(crate) fn abandon(&self, err: TaskError) -> bool {
        {
            let control = self.control.lock();
            if control.state != TaskState::Created {
                return false;
            }
        }
        self.finish(Err(err));
        true
    }

    fn finish(&self, outcome: Result<(), TaskError>) {
        {
            let mut control = self.control.lock();
            if control.state.is_terminal() {
                return;
            }
            control.state = TaskState::from_outcome(&outcome);
            control.outcome = Some(outcome);
            control.context = None;
        }
        self.completed.notify_all();
        self.notify.notify_waiters();
    }

    /// Wait until the task finishes or `ctx` does.
    ///
    /// # Errors
    ///
    /// Returns the context error if `ctx` finished before the task.
    pub async fn wait(&self, ctx: &Context) -> Result<(), ContextError> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_finished() {
                return Ok(());
            }

            tokio::select! {
                biased;
                () = &mut notified => {}
                err = ctx.done() => {
                    return if self.is_finished() { Ok(()) } else { Err(err) };
                }
            }
        }
    }

    /// Block the current thread until the task finishes or `timeout` elapses.
    /// Returns whether the task finished.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut control = self.control.lock();
        while !control.state.is_terminal() {
            if self.completed.wait_until(&mut control, deadline).timed_out() {
                return control.state.is_terminal();
            }
        }
        true
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("priority", &self.priority())
            .field("state", &self.state())
            .field("has_body", &self.body.is_some())
            .finish_non_exhaustive()
    }
}
