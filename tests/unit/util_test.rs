//! Tests for utility functions

use prometheus_task_engine::util::{init_tracing, now_ms};

#[test]
fn test_now_ms_is_monotonic_enough() {
    let a = now_ms();
    std::thread::sleep(std::time::Duration::from_millis(2));
    let b = now_ms();
    assert!(a > 0);
    assert!(b >= a);
}

#[test]
fn test_init_tracing_twice_is_harmless() {
    init_tracing();
    init_tracing();
    tracing::info!(initialized = true, "tracing initialized");
}
