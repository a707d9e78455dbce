//! Tests for configuration validation

use prometheus_task_engine::config::{EngineConfig, ExecutorConfig, ResourceConfig};

#[test]
fn test_executor_config_validation() {
    let valid = ExecutorConfig::new()
        .with_worker_count(4)
        .with_intake_capacity(0)
        .with_thread_name_prefix("agent");
    assert!(valid.validate().is_ok());
}

#[test]
fn test_executor_config_invalid_worker_count() {
    assert!(ExecutorConfig::new().with_worker_count(0).validate().is_err());
}

#[test]
fn test_executor_config_invalid_stack_size() {
    assert!(ExecutorConfig::new().with_thread_stack_size(1024).validate().is_err());
}

#[test]
fn test_executor_config_invalid_prefix() {
    assert!(ExecutorConfig::new().with_thread_name_prefix("  ").validate().is_err());
}

#[test]
fn test_engine_config_duplicate_resources() {
    let cfg = EngineConfig {
        executor: ExecutorConfig::new(),
        resources: vec![
            ResourceConfig::Semaphore { name: "gpu".into(), capacity: 1 },
            ResourceConfig::Semaphore { name: "gpu".into(), capacity: 2 },
        ],
        ..EngineConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_engine_config_from_json() {
    let json = r#"{
        "executor": {
            "worker_count": 8,
            "intake_capacity": 32,
            "thread_stack_size": 1048576,
            "thread_name_prefix": "agent"
        },
        "resources": [
            { "kind": "semaphore", "name": "gpu", "capacity": 2 }
        ]
    }"#;

    let config = EngineConfig::from_json_str(json).unwrap();
    assert_eq!(config.executor.worker_count, 8);
    assert_eq!(config.executor.intake_capacity, 32);
    assert_eq!(
        config.resources,
        vec![ResourceConfig::Semaphore { name: "gpu".into(), capacity: 2 }]
    );
}

#[test]
fn test_engine_config_from_json_rejects_invalid() {
    assert!(EngineConfig::from_json_str(r#"{"executor": {"worker_count": 0}}"#).is_err());
    assert!(EngineConfig::from_json_str("not json").is_err());
}

#[test]
fn test_engine_config_from_env() {
    std::env::set_var("TASK_ENGINE_WORKERS", "3");
    std::env::set_var("TASK_ENGINE_INTAKE_CAPACITY", "7");
    let cfg = EngineConfig::from_env().unwrap();
    std::env::remove_var("TASK_ENGINE_WORKERS");
    std::env::remove_var("TASK_ENGINE_INTAKE_CAPACITY");

    assert_eq!(cfg.executor.worker_count, 3);
    assert_eq!(cfg.executor.intake_capacity, 7);
}

#[test]
fn test_engine_config_max_reports() {
    let cfg = EngineConfig::from_json_str(r#"{"max_reports": 25}"#).unwrap();
    assert_eq!(cfg.max_reports, 25);
    assert!(EngineConfig::from_json_str(r#"{"max_reports": 0}"#).is_err());
}
