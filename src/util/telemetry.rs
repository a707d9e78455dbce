//! Telemetry helpers for structured logging and tracing.

use tracing_subscriber::EnvFilter;

/// Fallback variable consulted when `RUST_LOG` is unset.
pub const LOG_ENV: &str = "TASK_ENGINE_LOG";

/// Initialize tracing. Users can install their own subscriber; this helper
/// installs a default env-filtered fmt subscriber only if none is set.
///
/// The filter comes from `RUST_LOG`, then [`LOG_ENV`], then `info`.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_thread_names(true)
        .try_init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env(LOG_ENV))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
