//! High-level facade combining a scheduler, a resource registry and a mailbox.

use std::future::Future;
use std::sync::Arc;

use crate::builders::build_agent;
use crate::config::{EngineConfig, ExecutorConfig};
use crate::core::{
    Allocation, Context, EngineError, ExecutorStats, Priority, Resource, ResourceError, ResourceManager,
    Scheduler, SchedulerError, Task, TaskError,
};
use crate::infra::InMemoryMailbox;

/// Embedding surface for concurrent tasks and shared resources.
///
/// Every call forwards to the scheduler or the resource registry. Task bodies
/// reach resources through a clone of [`Agent::resources`].
///
/// ```rust,ignore
/// let agent = Agent::new(4)?;
/// agent.start()?;
/// agent.register_semaphore("gpu", 2)?;
/// let resources = agent.resources();
/// agent.spawn("render", Priority::High, move |_ctx| {
///     let resources = Arc::clone(&resources);
///     async move {
///         let _gpu = resources.acquire("gpu")?;
///         Ok(())
///     }
/// })?;
/// agent.soft_stop()?;
/// ```
#[derive(Debug)]
pub struct Agent {
    scheduler: Scheduler,
    mailbox: Arc<InMemoryMailbox>,
}

impl Agent {
    /// Agent with `worker_count` workers and default settings otherwise.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidConfig`] if `worker_count` is zero.
    pub fn new(worker_count: usize) -> Result<Self, EngineError> {
        Self::from_config(&EngineConfig {
            executor: ExecutorConfig::default().with_worker_count(worker_count),
            ..EngineConfig::default()
        })
    }

    /// Agent built from configuration, with its resources registered.
    ///
    /// # Errors
    ///
    /// Validation or resource registration failure.
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        build_agent(config)
    }

    /// Assemble an agent from an already wired scheduler and the mailbox its
    /// executor delivers to.
    #[must_use]
    pub const fn from_parts(scheduler: Scheduler, mailbox: Arc<InMemoryMailbox>) -> Self {
        Self { scheduler, mailbox }
    }

    /// Start executing tasks.
    ///
    /// # Errors
    ///
    /// See [`Scheduler::start`].
    pub fn start(&self) -> Result<(), SchedulerError> {
        self.scheduler.start()
    }

    /// Stop immediately: queued tasks are canceled, dispatched ones finish.
    pub fn stop(&self) {
        self.scheduler.stop();
    }

    /// Stop immediately, canceling queued and running tasks.
    pub fn abort(&self) {
        self.scheduler.abort();
    }

    /// Stop after every submitted task finished.
    ///
    /// # Errors
    ///
    /// See [`Scheduler::soft_stop`].
    pub fn soft_stop(&self) -> Result<(), SchedulerError> {
        self.scheduler.soft_stop()
    }

    /// Register a shared resource.
    ///
    /// # Errors
    ///
    /// [`ResourceError::AlreadyRegistered`] if the name is taken.
    pub fn register_resource(&self, name: impl Into<String>, resource: Arc<dyn Resource>) -> Result<(), ResourceError> {
        self.resources_ref().register(name, resource)
    }

    /// Register a counting semaphore.
    ///
    /// # Errors
    ///
    /// [`ResourceError::AlreadyRegistered`] if the name is taken.
    pub fn register_semaphore(&self, name: impl Into<String>, capacity: u32) -> Result<(), ResourceError> {
        self.resources_ref().register_semaphore(name, capacity)
    }

    /// Remove a shared resource.
    ///
    /// # Errors
    ///
    /// [`ResourceError::NotFound`] if the name is unknown.
    pub fn unregister_resource(&self, name: &str) -> Result<(), ResourceError> {
        self.resources_ref().unregister(name)
    }

    /// Reserve one unit of a resource.
    ///
    /// # Errors
    ///
    /// See [`ResourceManager::allocate`].
    pub fn allocate_resource(&self, name: &str) -> Result<(), ResourceError> {
        self.resources_ref().allocate(name)
    }

    /// Release one unit of a resource.
    ///
    /// # Errors
    ///
    /// See [`ResourceManager::deallocate`].
    pub fn deallocate_resource(&self, name: &str) -> Result<(), ResourceError> {
        self.resources_ref().deallocate(name)
    }

    /// Reserve one unit, released when the guard drops.
    ///
    /// # Errors
    ///
    /// See [`ResourceManager::acquire`].
    pub fn acquire_resource(&self, name: &str) -> Result<Allocation<'_>, ResourceError> {
        self.resources_ref().acquire(name)
    }

    /// Submit a task.
    ///
    /// # Errors
    ///
    /// See [`Scheduler::submit`].
    pub fn submit_task(&self, task: Arc<Task>) -> Result<(), SchedulerError> {
        self.scheduler.submit(task)
    }

    /// Build a task from a closure, submit it and return its handle.
    ///
    /// # Errors
    ///
    /// See [`Scheduler::submit`].
    pub fn spawn<F, Fut>(&self, id: impl Into<String>, priority: Priority, body: F) -> Result<Arc<Task>, SchedulerError>
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let task = Arc::new(Task::new(id, priority, body));
        self.scheduler.submit(Arc::clone(&task))?;
        Ok(task)
    }

    /// Shared handle to the resource registry, for task bodies.
    #[must_use]
    pub fn resources(&self) -> Arc<ResourceManager> {
        Arc::clone(self.scheduler.resources())
    }

    /// Reports of every executed task.
    #[must_use]
    pub const fn mailbox(&self) -> &Arc<InMemoryMailbox> {
        &self.mailbox
    }

    /// The underlying scheduler.
    #[must_use]
    pub const fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Executor counters.
    #[must_use]
    pub fn stats(&self) -> ExecutorStats {
        self.scheduler.stats()
    }

    fn resources_ref(&self) -> &ResourceManager {
        self.scheduler.resources()
    }
}
