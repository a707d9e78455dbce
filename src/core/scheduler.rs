//! Priority-ordered dispatch from a [`PriorityQueue`] into an [`Executor`].

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::core::error::{ExecutorError, SchedulerError, TaskError};
use crate::core::executor::{Executor, ExecutorPhase, ExecutorStats};
use crate::core::priority_queue::PriorityQueue;
use crate::core::resource::ResourceManager;
use crate::core::task::{Priority, Task};

/// Couples a priority queue with an executor.
///
/// Every submission drains the queue into the executor intake, highest
/// priority first and FIFO within a tier. Drains are serialized. Tasks
/// submitted before [`start`](Self::start) stay queued until it runs.
///
/// The admission check and the push happen under the `accepting` lock, and
/// every shutdown path clears the flag under that lock before it drains the
/// queue, so an accepted task is always dispatched or discarded.
pub struct Scheduler {
    queue: PriorityQueue,
    executor: Executor,
    resources: Arc<ResourceManager>,
    dispatch_lock: Mutex<()>,
    accepting: Mutex<bool>,
}

impl Scheduler {
    /// Create a scheduler over `executor`. The resource manager is held for
    /// callers and never consulted during dispatch.
    #[must_use]
    pub fn new(executor: Executor, resources: Arc<ResourceManager>) -> Self {
        Self {
            queue: PriorityQueue::new(),
            executor,
            resources,
            dispatch_lock: Mutex::new(()),
            accepting: Mutex::new(true),
        }
    }

    /// Start the executor and dispatch everything queued so far.
    ///
    /// # Errors
    ///
    /// Whatever [`Executor::start`] or the initial drain reports.
    pub fn start(&self) -> Result<(), SchedulerError> {
        self.executor.start()?;
        info!(queued = self.queue.len(), "scheduler started");
        self.dispatch()
    }

    /// Queue a task and drain the queue into the executor.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::ShuttingDown`] after `stop` or `soft_stop`; the task
    ///   is left untouched
    /// - [`SchedulerError::Executor`] if the executor refused a task during the
    ///   drain; that task is marked failed with [`TaskError::Rejected`]
    pub fn submit(&self, task: Arc<Task>) -> Result<(), SchedulerError> {
        {
            let accepting = self.accepting.lock();
            if !*accepting {
                warn!(task_id = %task.id(), "submission refused, scheduler shutting down");
                return Err(SchedulerError::ShuttingDown);
            }
            debug!(task_id = %task.id(), priority = ?task.priority(), "task queued");
            self.queue.push(task);
        }
        self.dispatch()
    }

    fn refuse_submissions(&self) {
        *self.accepting.lock() = false;
    }

    fn dispatch(&self) -> Result<(), SchedulerError> {
        let _guard = self.dispatch_lock.lock();
        if !self.executor.is_running() {
            return Ok(());
        }
        while let Some(task) = self.queue.pop() {
            if let Err(err) = self.executor.submit(Arc::clone(&task)) {
                warn!(task_id = %task.id(), error = %err, "executor refused task");
                task.abandon(TaskError::Rejected(task.id().to_string()));
                return Err(err.into());
            }
        }
        Ok(())
    }

    /// Stop immediately: refuse new tasks, cancel every queued task, then
    /// [`Executor::stop`], which lets already dispatched tasks finish.
    /// Idempotent.
    pub fn stop(&self) {
        self.discard_queued();
        self.executor.stop();
    }

    /// Like [`stop`](Self::stop), but through [`Executor::abort`], so
    /// dispatched tasks are canceled too.
    pub fn abort(&self) {
        self.discard_queued();
        self.executor.abort();
    }

    fn discard_queued(&self) {
        self.refuse_submissions();
        let discarded = self.queue.drain();
        for task in &discarded {
            task.abandon(TaskError::Canceled);
        }
        info!(discarded = discarded.len(), "scheduler stopping");
    }

    /// Stop gracefully: refuse new tasks, dispatch everything queued, wait for
    /// the queue to empty and for every dispatched task to finish.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Executor`] with [`ExecutorError::NotRunning`] if the
    /// scheduler was never started, or any error from the final drain.
    pub fn soft_stop(&self) -> Result<(), SchedulerError> {
        match self.executor.phase() {
            ExecutorPhase::Idle => return Err(ExecutorError::NotRunning.into()),
            ExecutorPhase::Stopped => {
                self.discard_queued();
                return Ok(());
            }
            ExecutorPhase::Running | ExecutorPhase::Draining => {}
        }
        self.refuse_submissions();
        info!(queued = self.queue.len(), "scheduler soft stop");

        self.dispatch()?;
        self.queue.wait_until_empty();
        // A concurrent drain may still hold a popped task; let it hand it over.
        drop(self.dispatch_lock.lock());
        self.executor.soft_stop()?;
        Ok(())
    }

    /// Change a task's priority, re-balancing the queue if it is still queued.
    pub fn update_priority(&self, task: &Task, priority: Priority) {
        self.queue.update_priority(task, priority);
    }

    /// Remove a still-queued task and mark it canceled. Returns `false` if no
    /// queued task has that id; dispatched tasks are canceled through
    /// [`Task::cancel`].
    pub fn cancel(&self, task_id: &str) -> bool {
        match self.queue.remove(task_id) {
            Some(task) => {
                task.abandon(TaskError::Canceled);
                debug!(task_id, "queued task canceled");
                true
            }
            None => false,
        }
    }

    /// Tasks waiting in the queue.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Whether the executor is running and submissions are accepted.
    #[must_use]
    pub fn is_running(&self) -> bool {
        *self.accepting.lock() && self.executor.is_running()
    }

    /// The underlying executor.
    #[must_use]
    pub const fn executor(&self) -> &Executor {
        &self.executor
    }

    /// The resource manager handed in at construction.
    #[must_use]
    pub const fn resources(&self) -> &Arc<ResourceManager> {
        &self.resources
    }

    /// Executor counters.
    #[must_use]
    pub fn stats(&self) -> ExecutorStats {
        self.executor.stats()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.pending())
            .field("executor", &self.executor)
            .field("accepting", &*self.accepting.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutorConfig;
    use crate::core::task::TaskState;
    use std::time::Duration;

    fn scheduler(workers: usize) -> Scheduler {
        let executor = Executor::new(ExecutorConfig::new().with_worker_count(workers)).unwrap();
        Scheduler::new(executor, Arc::new(ResourceManager::new()))
    }

    fn recording(id: &str, priority: Priority, log: &Arc<Mutex<Vec<String>>>) -> Arc<Task> {
        let log = Arc::clone(log);
        let name = id.to_string();
        Arc::new(Task::new(id, priority, move |_ctx| {
            log.lock().push(name.clone());
            async { Ok(()) }
        }))
    }

    #[test]
    fn test_tasks_queued_before_start_run_in_priority_order() {
        let s = scheduler(1);
        let log = Arc::new(Mutex::new(Vec::new()));

        s.submit(recording("low", Priority::Low, &log)).unwrap();
        s.submit(recording("medium-1", Priority::Medium, &log)).unwrap();
        s.submit(recording("high", Priority::High, &log)).unwrap();
        s.submit(recording("medium-2", Priority::Medium, &log)).unwrap();
        assert_eq!(s.pending(), 4);

        s.start().unwrap();
        s.soft_stop().unwrap();

        assert_eq!(*log.lock(), vec!["high", "medium-1", "medium-2", "low"]);
    }

    #[test]
    fn test_update_priority_before_start() {
        let s = scheduler(1);
        let log = Arc::new(Mutex::new(Vec::new()));
        let late = recording("late", Priority::Low, &log);

        s.submit(recording("first", Priority::Medium, &log)).unwrap();
        s.submit(Arc::clone(&late)).unwrap();
        s.update_priority(&late, Priority::High);

        s.start().unwrap();
        s.soft_stop().unwrap();
        assert_eq!(*log.lock(), vec!["late", "first"]);
    }

    #[test]
    fn test_cancel_queued_task() {
        let s = scheduler(1);
        let log = Arc::new(Mutex::new(Vec::new()));
        let doomed = recording("doomed", Priority::High, &log);
        s.submit(Arc::clone(&doomed)).unwrap();

        assert!(s.cancel("doomed"));
        assert!(!s.cancel("doomed"));
        assert_eq!(doomed.state(), TaskState::Canceled);

        s.start().unwrap();
        s.soft_stop().unwrap();
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_stop_discards_queued_tasks() {
        let s = scheduler(1);
        let queued = Arc::new(Task::new("queued", Priority::Low, |_ctx| async { Ok(()) }));
        s.submit(Arc::clone(&queued)).unwrap();

        s.stop();
        assert_eq!(queued.state(), TaskState::Canceled);
        assert!(queued.wait_timeout(Duration::from_millis(10)));

        let late = Arc::new(Task::new("late", Priority::Low, |_ctx| async { Ok(()) }));
        assert!(matches!(s.submit(late), Err(SchedulerError::ShuttingDown)));
    }

    #[test]
    fn test_soft_stop_before_start_fails() {
        let s = scheduler(1);
        assert!(matches!(
            s.soft_stop(),
            Err(SchedulerError::Executor(ExecutorError::NotRunning))
        ));
    }

    #[test]
    fn test_soft_stop_waits_for_every_task() {
        let s = scheduler(3);
        s.start().unwrap();

        let tasks: Vec<_> = (0..12)
            .map(|i| {
                Arc::new(Task::new(format!("t{i}"), Priority::Medium, |_ctx| async {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok(())
                }))
            })
            .collect();
        for task in &tasks {
            s.submit(Arc::clone(task)).unwrap();
        }

        s.soft_stop().unwrap();
        assert!(tasks.iter().all(|t| t.state() == TaskState::Completed));
        assert_eq!(s.stats().completed_tasks, 12);
        assert!(!s.is_running());
    }
}
