//! Embedding surface for host processes.

pub mod agent;

pub use agent::Agent;
