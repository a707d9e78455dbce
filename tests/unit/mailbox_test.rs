//! Tests for mailbox implementations

use prometheus_task_engine::core::{Mailbox, MailboxError, Priority, Task, TaskError, TaskReport, TaskState};
use prometheus_task_engine::config::DEFAULT_MAX_REPORTS;
use prometheus_task_engine::infra::{ChannelMailbox, InMemoryMailbox};

fn report(id: &str, result: &Result<(), TaskError>) -> TaskReport {
    let task = Task::new(id, Priority::High, |_ctx| async { Ok(()) });
    TaskReport::new(&task, result)
}

#[test]
fn test_in_memory_mailbox_deliver_and_fetch() {
    let mailbox = InMemoryMailbox::new();
    mailbox.deliver(report("a", &Ok(()))).unwrap();
    mailbox.deliver(report("b", &Err(TaskError::failed("boom")))).unwrap();

    let a = mailbox.fetch("a").unwrap();
    assert!(a.succeeded());
    assert_eq!(a.priority, Priority::High);
    assert_eq!(a.state, TaskState::Created);
    assert!(mailbox.fetch("missing").is_none());
    assert_eq!(mailbox.failures().len(), 1);
}

#[test]
fn test_in_memory_mailbox_fetch_since_limit() {
    let mailbox = InMemoryMailbox::new();
    for id in ["a", "b", "c"] {
        mailbox.deliver(report(id, &Ok(()))).unwrap();
    }
    assert_eq!(mailbox.fetch_since(None, 2).len(), 2);
    assert!(mailbox.fetch_since(Some(u128::MAX), 10).is_empty());

    let drained = mailbox.drain();
    assert_eq!(drained.len(), 3);
    assert!(mailbox.is_empty());
}

#[test]
fn test_channel_mailbox_reports_closed_receiver() {
    let (mailbox, rx) = ChannelMailbox::new();
    mailbox.deliver(report("x", &Ok(()))).unwrap();
    assert_eq!(rx.recv().unwrap().task_id, "x");

    drop(rx);
    assert_eq!(mailbox.deliver(report("y", &Ok(()))), Err(MailboxError::Closed));
}

#[test]
fn test_report_serializes_error_as_text() {
    let json = serde_json::to_value(report("e", &Err(TaskError::Canceled))).unwrap();
    assert_eq!(json["task_id"], "e");
    assert_eq!(json["priority"], "high");
    assert_eq!(json["error"], "task canceled");
}

#[test]
fn test_in_memory_mailbox_evicts_oldest_beyond_capacity() {
    let mailbox = InMemoryMailbox::with_capacity(3);
    for id in ["a", "b", "c", "d", "e"] {
        mailbox.deliver(report(id, &Ok(()))).unwrap();
    }

    assert_eq!(mailbox.capacity(), 3);
    assert_eq!(mailbox.len(), 3);
    assert!(mailbox.fetch("a").is_none());
    assert!(mailbox.fetch("b").is_none());
    let ids: Vec<_> = mailbox.drain().into_iter().map(|r| r.task_id).collect();
    assert_eq!(ids, vec!["c", "d", "e"]);
}

#[test]
fn test_in_memory_mailbox_default_is_bounded() {
    assert_eq!(InMemoryMailbox::new().capacity(), DEFAULT_MAX_REPORTS);
    assert_eq!(InMemoryMailbox::with_capacity(0).capacity(), 1);
}
