//! # Prometheus Task Engine
//!
//! A priority-aware, in-process task execution engine for agent workloads.
//!
//! Callers submit prioritized tasks that run on a fixed pool of dedicated
//! worker threads. Bodies are async, receive a [`Context`](core::Context) for
//! cooperative cancellation and deadlines, and may contend over named,
//! capacity-limited resources. Shutdown is either immediate (cancel
//! everything) or graceful (drain every submitted task first).
//!
//! ## Components
//!
//! - **Task**: identity, mutable priority, dependency links, one-shot
//!   completion signal. Executes at most once.
//! - **PriorityQueue**: heap ordered by priority, FIFO within a tier.
//! - **ResourceManager**: registry of named resources; [`Semaphore`](core::Semaphore)
//!   is the built-in counting resource. Allocation never blocks.
//! - **Executor**: worker threads, each with its own single-threaded tokio
//!   runtime, fed by a bounded intake.
//! - **Scheduler**: drains the queue into the executor in priority order.
//! - **Agent**: facade forwarding lifecycle, resource and submission calls.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use prometheus_task_engine::core::{Priority, TaskError};
//! use prometheus_task_engine::runtime::Agent;
//!
//! let agent = Agent::new(4)?;
//! agent.start()?;
//! agent.register_semaphore("gpu", 2)?;
//!
//! let resources = agent.resources();
//! let task = agent.spawn("embed-batch", Priority::High, move |ctx| {
//!     let resources = Arc::clone(&resources);
//!     async move {
//!         let _gpu = resources.acquire("gpu")?;
//!         tokio::select! {
//!             err = ctx.done() => Err(TaskError::from(err)),
//!             () = tokio::time::sleep(std::time::Duration::from_millis(50)) => Ok(()),
//!         }
//!     }
//! })?;
//!
//! agent.soft_stop()?;
//! assert!(task.outcome().is_some());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Tasks, contexts, the priority queue, resources, executor and scheduler.
pub mod core;
/// Configuration models for the executor, resources and the engine.
pub mod config;
/// Builders to construct engine components from configuration.
pub mod builders;
/// Infrastructure adapters for task report delivery.
pub mod infra;
/// Embedding facade.
pub mod runtime;
/// Shared utilities.
pub mod util;
