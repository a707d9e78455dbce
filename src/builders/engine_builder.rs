//! Builders to construct engine components from configuration.

use std::sync::Arc;

use tracing::info;

use crate::config::{EngineConfig, ExecutorConfig, ResourceConfig};
use crate::core::{EngineError, Executor, Mailbox, ResourceManager, Scheduler};
use crate::infra::InMemoryMailbox;
use crate::runtime::Agent;

/// Build an idle executor, optionally delivering reports to `mailbox`.
///
/// # Errors
///
/// [`EngineError::InvalidConfig`] if the configuration does not validate.
pub fn build_executor(cfg: &ExecutorConfig, mailbox: Option<Arc<dyn Mailbox>>) -> Result<Executor, EngineError> {
    cfg.validate()
        .map_err(|e| EngineError::InvalidConfig(format!("executor invalid: {e}")))?;
    let executor = Executor::new(cfg.clone())?;
    Ok(match mailbox {
        Some(mailbox) => executor.with_mailbox(mailbox),
        None => executor,
    })
}

/// Build a registry holding every configured resource.
///
/// # Errors
///
/// [`EngineError::InvalidConfig`] for an invalid entry, or
/// [`EngineError::Resource`] if two entries share a name.
pub fn build_resources(resources: &[ResourceConfig]) -> Result<ResourceManager, EngineError> {
    let manager = ResourceManager::new();
    for resource in resources {
        resource.validate().map_err(EngineError::InvalidConfig)?;
        match resource {
            ResourceConfig::Semaphore { name, capacity } => {
                manager.register_semaphore(name.clone(), *capacity)?;
            }
        }
    }
    Ok(manager)
}

/// Build an idle agent: executor with an in-memory mailbox bounded by
/// `max_reports`, configured resources and the scheduler tying them together.
///
/// # Errors
///
/// [`EngineError::InvalidConfig`] if validation fails.
pub fn build_agent(cfg: &EngineConfig) -> Result<Agent, EngineError> {
    cfg.validate().map_err(|e| EngineError::InvalidConfig(format!("config invalid: {e}")))?;

    let mailbox = Arc::new(InMemoryMailbox::with_capacity(cfg.max_reports));
    let executor = build_executor(&cfg.executor, Some(Arc::clone(&mailbox) as Arc<dyn Mailbox>))?;
    let resources = Arc::new(build_resources(&cfg.resources)?);

    info!(
        worker_count = cfg.executor.worker_count,
        resources = cfg.resources.len(),
        max_reports = cfg.max_reports,
        "agent built"
    );
    Ok(Agent::from_parts(Scheduler::new(executor, resources), mailbox))
}
