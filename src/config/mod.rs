//! Configuration models for the executor, resources and the whole engine.

pub mod engine;

pub use engine::{EngineConfig, ExecutorConfig, ResourceConfig, DEFAULT_MAX_REPORTS};
