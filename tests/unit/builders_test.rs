//! Tests for builder modules

use prometheus_task_engine::builders::{build_agent, build_executor, build_resources};
use prometheus_task_engine::config::{EngineConfig, ExecutorConfig, ResourceConfig};
use prometheus_task_engine::core::{EngineError, ExecutorPhase, Priority, ResourceError};

fn semaphore(name: &str, capacity: u32) -> ResourceConfig {
    ResourceConfig::Semaphore {
        name: name.to_string(),
        capacity,
    }
}

#[test]
fn test_build_executor_is_idle() {
    let executor = build_executor(&ExecutorConfig::new().with_worker_count(2), None).unwrap();
    assert_eq!(executor.phase(), ExecutorPhase::Idle);
    assert_eq!(executor.stats().worker_count, 2);
}

#[test]
fn test_build_executor_rejects_invalid_config() {
    let err = build_executor(&ExecutorConfig::new().with_thread_stack_size(16), None).unwrap_err();
    assert!(matches!(err, EngineError::InvalidConfig(_)));
}

#[test]
fn test_build_resources_registers_each() {
    let manager = build_resources(&[semaphore("cpu", 4), semaphore("gpu", 1)]).unwrap();
    assert_eq!(manager.names(), vec!["cpu", "gpu"]);
    manager.allocate("gpu").unwrap();
    assert_eq!(manager.allocate("gpu"), Err(ResourceError::Exhausted { capacity: 1 }));
}

#[test]
fn test_build_resources_rejects_duplicates() {
    let err = build_resources(&[semaphore("gpu", 1), semaphore("gpu", 2)]).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Resource(ResourceError::AlreadyRegistered(ref name)) if name == "gpu"
    ));
}

#[test]
fn test_build_agent_validates_first() {
    let cfg = EngineConfig {
        executor: ExecutorConfig::new().with_worker_count(1),
        resources: vec![semaphore("gpu", 0)],
        ..EngineConfig::default()
    };
    assert!(matches!(build_agent(&cfg), Err(EngineError::InvalidConfig(_))));
}

#[test]
fn test_build_agent_bounds_its_mailbox() {
    let cfg = EngineConfig {
        executor: ExecutorConfig::new().with_worker_count(1),
        max_reports: 2,
        ..EngineConfig::default()
    };
    let agent = build_agent(&cfg).unwrap();
    agent.start().unwrap();
    for i in 0..5 {
        agent
            .spawn(format!("t{i}"), Priority::Low, |_ctx| async { Ok(()) })
            .unwrap();
    }
    agent.soft_stop().unwrap();

    assert_eq!(agent.mailbox().len(), 2);
    assert_eq!(agent.stats().completed_tasks, 5);
}
