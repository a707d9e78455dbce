//! Eight tasks sharing a two-slot semaphore on a four-worker agent.
//!
//! Run with `RUST_LOG=debug cargo run --example basic` to see dispatch logs.

use std::sync::Arc;
use std::time::Duration;

use prometheus_task_engine::core::{AppResult, Priority, ResourceError, TaskError};
use prometheus_task_engine::runtime::Agent;
use prometheus_task_engine::util::init_tracing;
use tracing::info;

fn main() -> AppResult<()> {
    init_tracing();

    let agent = Agent::new(4)?;
    agent.start()?;
    agent.register_semaphore("semaphore", 2)?;

    for i in 0..8 {
        let resources = agent.resources();
        agent.spawn(format!("task-{i}"), Priority::Medium, move |_ctx| {
            let resources = Arc::clone(&resources);
            async move {
                info!(task = i, "started");
                let slot = loop {
                    match resources.acquire("semaphore") {
                        Ok(slot) => break slot,
                        Err(ResourceError::Exhausted { .. }) => {
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                        Err(other) => return Err(TaskError::from(other)),
                    }
                };
                tokio::time::sleep(Duration::from_millis(100)).await;
                drop(slot);
                info!(task = i, "finished");
                Ok(())
            }
        })?;
    }

    agent.soft_stop()?;
    let stats = agent.stats();
    info!(
        completed = stats.completed_tasks,
        failed = stats.failed_tasks,
        "all tasks done"
    );
    Ok(())
}
