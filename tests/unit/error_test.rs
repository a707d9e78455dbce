//! Tests for error types

use prometheus_task_engine::core::{
    EngineError, ExecutorError, MailboxError, ResourceError, SchedulerError, TaskError,
};

#[test]
fn test_resource_exhausted_error() {
    let err = ResourceError::Exhausted { capacity: 2 };
    assert_eq!(format!("{err}"), "resource exhausted: all 2 units are held");
}

#[test]
fn test_task_errors_display() {
    assert_eq!(
        format!("{}", TaskError::InvalidTask),
        "invalid task: task function is empty"
    );
    assert_eq!(
        format!("{}", TaskError::AlreadyStarted("t1".into())),
        "task t1 already started"
    );
    assert_eq!(
        format!("{}", TaskError::Rejected("t2".into())),
        "task t2 rejected: executor is shutting down"
    );
}

#[test]
fn test_executor_error_nests_into_engine_error() {
    let err = EngineError::from(ExecutorError::NotRunning);
    assert!(matches!(
        err,
        EngineError::Scheduler(SchedulerError::Executor(ExecutorError::NotRunning))
    ));
    assert_eq!(format!("{err}"), "executor is not running");
}

#[test]
fn test_mailbox_closed_error() {
    assert_eq!(format!("{}", MailboxError::Closed), "mailbox closed");
}

#[test]
fn test_anyhow_bodies_convert_with_question_mark() {
    fn body() -> Result<(), TaskError> {
        let parsed: anyhow::Result<u32> = "x".parse::<u32>().map_err(anyhow::Error::from);
        parsed?;
        Ok(())
    }
    assert!(matches!(body(), Err(TaskError::Failed(_))));
}
