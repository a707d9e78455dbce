//! Fixed-size worker pool running tasks on dedicated OS threads.
//!
//! Each worker owns a single-threaded tokio runtime and blocks on a shared
//! crossbeam intake, so task bodies never run on the caller's runtime.
//!
//! - **No polling**: workers block on `recv`; `soft_stop` waits on a condvar.
//! - **Clean shutdown**: `stop` drops the intake sender; workers run what is
//!   buffered and exit.
//! - **Abort**: `abort` also cancels the lifetime context, so buffered tasks
//!   resolve as canceled without running their bodies.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use crate::config::ExecutorConfig;
use crate::core::context::Context;
use crate::core::error::{ExecutorError, TaskError};
use crate::core::mailbox::{Mailbox, TaskReport};
use crate::core::task::Task;

/// Lifecycle phase of an executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorPhase {
    /// Constructed, workers not launched.
    Idle,
    /// Accepting and executing tasks.
    Running,
    /// `soft_stop` in progress: no new submissions, in-flight work finishing.
    Draining,
    /// Workers joined. Terminal.
    Stopped,
}

/// Snapshot of executor counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutorStats {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Submitted tasks whose execution has not finished yet.
    pub in_flight: usize,
    /// Tasks currently executing on a worker.
    pub active_tasks: u64,
    /// Tasks accepted by `submit`.
    pub submitted_tasks: u64,
    /// Executions that returned `Ok`.
    pub completed_tasks: u64,
    /// Executions that returned a non-cancellation error.
    pub failed_tasks: u64,
    /// Executions that ended canceled or past their deadline.
    pub canceled_tasks: u64,
}

#[derive(Debug, Default)]
struct ExecutorCounters {
    active_tasks: AtomicU64,
    submitted_tasks: AtomicU64,
    completed_tasks: AtomicU64,
    failed_tasks: AtomicU64,
    canceled_tasks: AtomicU64,
}

impl ExecutorCounters {
    fn record(&self, result: &Result<(), TaskError>) {
        let counter = match result {
            Ok(()) => &self.completed_tasks,
            Err(err) if err.is_cancellation() => &self.canceled_tasks,
            Err(_) => &self.failed_tasks,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self, worker_count: usize, in_flight: usize) -> ExecutorStats {
        ExecutorStats {
            worker_count,
            in_flight,
            active_tasks: self.active_tasks.load(Ordering::Relaxed),
            submitted_tasks: self.submitted_tasks.load(Ordering::Relaxed),
            completed_tasks: self.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: self.failed_tasks.load(Ordering::Relaxed),
            canceled_tasks: self.canceled_tasks.load(Ordering::Relaxed),
        }
    }
}

/// Count of submitted-but-unfinished tasks with a condvar signaled at zero.
#[derive(Debug, Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn begin(&self) {
        *self.count.lock() += 1;
    }

    fn finish(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    fn wait_idle(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.idle.wait(&mut count);
        }
    }

    fn current(&self) -> usize {
        *self.count.lock()
    }
}

/// Finishes one in-flight entry when dropped, including during unwinding.
struct InFlightGuard<'a>(&'a InFlight);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

#[derive(Debug, Default)]
struct Shared {
    counters: ExecutorCounters,
    in_flight: InFlight,
}

struct Lifecycle {
    phase: ExecutorPhase,
    intake: Option<Sender<Arc<Task>>>,
    root: Option<Context>,
    workers: Vec<JoinHandle<()>>,
}

/// Worker pool executing [`Task`]s.
///
/// Dropping a running executor without `stop` closes the intake and cancels
/// running tasks but does not join the workers.
pub struct Executor {
    config: ExecutorConfig,
    lifecycle: Mutex<Lifecycle>,
    shared: Arc<Shared>,
    mailbox: Option<Arc<dyn Mailbox>>,
}

impl Executor {
    /// Create an idle executor.
    ///
    /// # Errors
    ///
    /// [`ExecutorError::InvalidConfig`] if the configuration does not validate.
    pub fn new(config: ExecutorConfig) -> Result<Self, ExecutorError> {
        config.validate().map_err(ExecutorError::InvalidConfig)?;
        Ok(Self {
            config,
            lifecycle: Mutex::new(Lifecycle {
                phase: ExecutorPhase::Idle,
                intake: None,
                root: None,
                workers: Vec::new(),
            }),
            shared: Arc::new(Shared::default()),
            mailbox: None,
        })
    }

    /// Create an idle executor with `worker_count` workers and defaults otherwise.
    ///
    /// # Errors
    ///
    /// [`ExecutorError::InvalidConfig`] if `worker_count` is zero.
    pub fn with_workers(worker_count: usize) -> Result<Self, ExecutorError> {
        Self::new(ExecutorConfig::default().with_worker_count(worker_count))
    }

    /// Deliver a [`TaskReport`] to `mailbox` after every execution.
    #[must_use]
    pub fn with_mailbox(mut self, mailbox: Arc<dyn Mailbox>) -> Self {
        self.mailbox = Some(mailbox);
        self
    }

    /// Configuration the executor was built with.
    #[must_use]
    pub const fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> ExecutorPhase {
        self.lifecycle.lock().phase
    }

    /// Whether the executor accepts submissions.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.phase() == ExecutorPhase::Running
    }

    /// Launch the workers.
    ///
    /// Runtimes are built up front so a failure leaves the executor idle with
    /// no thread started.
    ///
    /// # Errors
    ///
    /// - [`ExecutorError::AlreadyStarted`] unless the executor is idle
    /// - [`ExecutorError::Spawn`] if a runtime or thread cannot be created
    pub fn start(&self) -> Result<(), ExecutorError> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.phase != ExecutorPhase::Idle {
            return Err(ExecutorError::AlreadyStarted);
        }

        let runtimes = (0..self.config.worker_count)
            .map(|_| tokio::runtime::Builder::new_current_thread().enable_all().build())
            .collect::<Result<Vec<_>, _>>()?;

        let (intake_tx, intake_rx) = bounded::<Arc<Task>>(self.config.intake_capacity);
        let root = Context::background();
        let mut workers = Vec::with_capacity(runtimes.len());

        for (worker_id, runtime) in runtimes.into_iter().enumerate() {
            let spawned = self.spawn_worker(worker_id, runtime, intake_rx.clone(), root.clone());
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    warn!(worker_id, error = %e, "failed to spawn worker, unwinding start");
                    drop(intake_tx);
                    root.cancel();
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(e.into());
                }
            }
        }

        lifecycle.phase = ExecutorPhase::Running;
        lifecycle.intake = Some(intake_tx);
        lifecycle.root = Some(root);
        lifecycle.workers = workers;

        info!(
            worker_count = self.config.worker_count,
            intake_capacity = self.config.intake_capacity,
            "executor started"
        );
        Ok(())
    }

    fn spawn_worker(
        &self,
        worker_id: usize,
        runtime: Runtime,
        intake: Receiver<Arc<Task>>,
        root: Context,
    ) -> std::io::Result<JoinHandle<()>> {
        let shared = Arc::clone(&self.shared);
        let mailbox = self.mailbox.clone();

        thread::Builder::new()
            .name(format!("{}-{worker_id}", self.config.thread_name_prefix))
            .stack_size(self.config.thread_stack_size)
            .spawn(move || {
                debug!(worker_id, "worker started");

                // Ends once the intake is closed and empty.
                while let Ok(task) = intake.recv() {
                    let _in_flight = InFlightGuard(&shared.in_flight);
                    shared.counters.active_tasks.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        worker_id,
                        task_id = %task.id(),
                        priority = ?task.priority(),
                        "executing task"
                    );

                    let result = runtime.block_on(task.execute(&root));

                    shared.counters.active_tasks.fetch_sub(1, Ordering::Relaxed);
                    shared.counters.record(&result);
                    match &result {
                        Ok(()) => debug!(worker_id, task_id = %task.id(), "task completed"),
                        Err(err) => debug!(worker_id, task_id = %task.id(), error = %err, "task ended with error"),
                    }

                    if let Some(mailbox) = &mailbox {
                        let report = TaskReport::new(&task, &result);
                        match panic::catch_unwind(AssertUnwindSafe(|| mailbox.deliver(report))) {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => {
                                warn!(worker_id, task_id = %task.id(), error = %e, "failed to deliver task report");
                            }
                            Err(_) => warn!(worker_id, task_id = %task.id(), "mailbox panicked delivering task report"),
                        }
                    }
                }

                debug!(worker_id, "intake closed, worker exiting");
            })
    }

    /// Hand a task to the workers, blocking while the intake is full.
    ///
    /// # Errors
    ///
    /// - [`ExecutorError::NotRunning`] before `start`
    /// - [`ExecutorError::ShuttingDown`] once a stop began
    ///
    /// A call already blocked on a full intake when a stop begins still hands
    /// its task over and returns `Ok`; the workers run it (or, after
    /// [`abort`](Self::abort), resolve it as canceled) before exiting.
    pub fn submit(&self, task: Arc<Task>) -> Result<(), ExecutorError> {
        let intake = {
            let lifecycle = self.lifecycle.lock();
            match lifecycle.phase {
                ExecutorPhase::Idle => return Err(ExecutorError::NotRunning),
                ExecutorPhase::Draining | ExecutorPhase::Stopped => {
                    return Err(ExecutorError::ShuttingDown)
                }
                ExecutorPhase::Running => {}
            }
            let Some(intake) = lifecycle.intake.clone() else {
                return Err(ExecutorError::ShuttingDown);
            };
            // Counted under the lifecycle lock so soft_stop cannot miss it.
            self.shared.in_flight.begin();
            intake
        };

        let task_id = task.id().to_string();
        if intake.send(task).is_err() {
            self.shared.in_flight.finish();
            warn!(task_id = %task_id, "intake closed during submit");
            return Err(ExecutorError::ShuttingDown);
        }
        self.shared.counters.submitted_tasks.fetch_add(1, Ordering::Relaxed);
        debug!(task_id = %task_id, "task submitted to executor");
        Ok(())
    }

    /// Close the intake and join the workers once they have finished their
    /// current task and everything still buffered. Nothing is canceled.
    /// Idempotent; a concurrent second call returns without waiting.
    pub fn stop(&self) {
        self.shutdown(false);
    }

    /// Like [`stop`](Self::stop), but cancel the lifetime context first:
    /// running bodies observe cancellation and buffered tasks resolve as
    /// canceled without running.
    ///
    /// Workers finish only when their current body returns, so a body that
    /// ignores its context delays this call.
    pub fn abort(&self) {
        self.shutdown(true);
    }

    fn shutdown(&self, cancel: bool) {
        let (root, workers) = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.phase == ExecutorPhase::Stopped {
                return;
            }
            lifecycle.phase = ExecutorPhase::Stopped;
            lifecycle.intake = None;
            (lifecycle.root.take(), std::mem::take(&mut lifecycle.workers))
        };

        info!(in_flight = self.shared.in_flight.current(), cancel, "stopping executor");
        if let Some(root) = root.filter(|_| cancel) {
            root.cancel();
        }

        let worker_count = workers.len();
        for (worker_id, handle) in workers.into_iter().enumerate() {
            if handle.join().is_err() {
                warn!(worker_id, "worker thread panicked");
            }
        }
        info!(worker_count, "executor stopped");
    }

    /// Refuse new submissions, wait until every submitted task finished, then
    /// [`stop`](Self::stop).
    ///
    /// Must not be called from inside a task body running on this executor.
    ///
    /// # Errors
    ///
    /// [`ExecutorError::NotRunning`] if the executor was never started.
    pub fn soft_stop(&self) -> Result<(), ExecutorError> {
        {
            let mut lifecycle = self.lifecycle.lock();
            match lifecycle.phase {
                ExecutorPhase::Idle => return Err(ExecutorError::NotRunning),
                ExecutorPhase::Stopped => return Ok(()),
                ExecutorPhase::Running | ExecutorPhase::Draining => {
                    lifecycle.phase = ExecutorPhase::Draining;
                }
            }
        }

        info!(in_flight = self.shared.in_flight.current(), "soft stop: draining in-flight tasks");
        self.shared.in_flight.wait_idle();
        self.stop();
        Ok(())
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> ExecutorStats {
        self.shared
            .counters
            .snapshot(self.config.worker_count, self.shared.in_flight.current())
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.phase == ExecutorPhase::Stopped {
            return;
        }
        lifecycle.phase = ExecutorPhase::Stopped;
        lifecycle.intake = None;
        if let Some(root) = lifecycle.root.take() {
            root.cancel();
        }
        if !lifecycle.workers.is_empty() {
            debug!("executor dropped without stop, workers detached");
        }
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("phase", &self.phase())
            .field("config", &self.config)
            .field("has_mailbox", &self.mailbox.is_some())
            .finish_non_exhaustive()
    }
}
