//! Executor and engine configuration structures.

use std::env;

use serde::{Deserialize, Serialize};

/// Environment variable overriding [`ExecutorConfig::worker_count`].
pub const WORKERS_ENV: &str = "TASK_ENGINE_WORKERS";
/// Environment variable overriding [`ExecutorConfig::intake_capacity`].
pub const INTAKE_CAPACITY_ENV: &str = "TASK_ENGINE_INTAKE_CAPACITY";
/// Environment variable overriding [`ExecutorConfig::thread_stack_size`].
pub const STACK_SIZE_ENV: &str = "TASK_ENGINE_STACK_SIZE";

/// Environment variable overriding [`EngineConfig::max_reports`].
pub const MAX_REPORTS_ENV: &str = "TASK_ENGINE_MAX_REPORTS";

/// Reports an agent's in-memory mailbox retains unless configured otherwise.
pub const DEFAULT_MAX_REPORTS: usize = 10_000;

const MIN_STACK_SIZE: usize = 64 * 1024;

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Number of worker threads. Defaults to the number of logical CPUs.
    pub worker_count: usize,
    /// Tasks the intake buffers before `submit` blocks. Zero makes every
    /// submission a rendezvous with an idle worker.
    pub intake_capacity: usize,
    /// Stack size of each worker thread in bytes.
    pub thread_stack_size: usize,
    /// Worker threads are named `{prefix}-{index}`.
    pub thread_name_prefix: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get(),
            intake_capacity: 1024,
            thread_stack_size: 2 * 1024 * 1024,
            thread_name_prefix: "task-worker".to_string(),
        }
    }
}

impl ExecutorConfig {
    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads.
    #[must_use]
    pub const fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the intake buffer size.
    #[must_use]
    pub const fn with_intake_capacity(mut self, intake_capacity: usize) -> Self {
        self.intake_capacity = intake_capacity;
        self
    }

    /// Set the worker thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, thread_stack_size: usize) -> Self {
        self.thread_stack_size = thread_stack_size;
        self
    }

    /// Set the worker thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Describes the first offending field.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.thread_stack_size < MIN_STACK_SIZE {
            return Err(format!("thread_stack_size must be at least {MIN_STACK_SIZE} bytes"));
        }
        if self.thread_name_prefix.trim().is_empty() {
            return Err("thread_name_prefix must not be empty".into());
        }
        Ok(())
    }

    /// Apply overrides from the process environment (after loading `.env`).
    ///
    /// # Errors
    ///
    /// Returns a message naming the variable whose value does not parse.
    pub fn apply_env(mut self) -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        if let Some(value) = read_env(WORKERS_ENV)? {
            self.worker_count = value;
        }
        if let Some(value) = read_env(INTAKE_CAPACITY_ENV)? {
            self.intake_capacity = value;
        }
        if let Some(value) = read_env(STACK_SIZE_ENV)? {
            self.thread_stack_size = value;
        }
        Ok(self)
    }
}

fn read_env(key: &str) -> Result<Option<usize>, String> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| format!("{key}={raw:?} is not a valid number: {e}")),
        Err(_) => Ok(None),
    }
}

/// A named resource created when an engine is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceConfig {
    /// Counting semaphore.
    Semaphore {
        /// Registry name.
        name: String,
        /// Maximum concurrently held units.
        capacity: u32,
    },
}

impl ResourceConfig {
    /// Registry name of the resource.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Semaphore { name, .. } => name,
        }
    }

    /// Validate resource values.
    ///
    /// # Errors
    ///
    /// Describes the offending field.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Semaphore { name, capacity } => {
                if name.trim().is_empty() {
                    return Err("resource name must not be empty".into());
                }
                if *capacity == 0 {
                    return Err(format!("semaphore `{name}` capacity must be greater than 0"));
                }
                Ok(())
            }
        }
    }
}

/// Root engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker pool settings.
    pub executor: ExecutorConfig,
    /// Resources registered at build time.
    pub resources: Vec<ResourceConfig>,
    /// Task reports the agent's mailbox retains; older ones are evicted.
    pub max_reports: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            executor: ExecutorConfig::default(),
            resources: Vec::new(),
            max_reports: DEFAULT_MAX_REPORTS,
        }
    }
}

impl EngineConfig {
    /// Validate the executor and every resource, and reject duplicate names.
    ///
    /// # Errors
    ///
    /// Describes the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        self.executor
            .validate()
            .map_err(|e| format!("executor invalid: {e}"))?;
        if self.max_reports == 0 {
            return Err("max_reports must be greater than 0".into());
        }
        let mut seen = std::collections::HashSet::new();
        for resource in &self.resources {
            resource.validate()?;
            if !seen.insert(resource.name()) {
                return Err(format!("resource `{}` defined twice", resource.name()));
            }
        }
        Ok(())
    }

    /// Parse engine configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults overridden from the environment, validated.
    ///
    /// # Errors
    ///
    /// Unparseable variable or validation failure.
    pub fn from_env() -> Result<Self, String> {
        let cfg = Self {
            executor: ExecutorConfig::default().apply_env()?,
            max_reports: read_env(MAX_REPORTS_ENV)?.unwrap_or(DEFAULT_MAX_REPORTS),
            ..Self::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }
}
