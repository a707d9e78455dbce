//! Builders to construct engine components from configuration.

pub mod engine_builder;

pub use engine_builder::{build_agent, build_executor, build_resources};
