//! In-memory mailbox backend.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::config::DEFAULT_MAX_REPORTS;
use crate::core::{Mailbox, MailboxError, TaskReport};

/// Keeps the most recent reports in delivery order, evicting the oldest once
/// `max_reports` are stored.
#[derive(Debug)]
pub struct InMemoryMailbox {
    reports: Mutex<VecDeque<TaskReport>>,
    max_reports: usize,
}

impl Default for InMemoryMailbox {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_REPORTS)
    }
}

impl InMemoryMailbox {
    /// Create an empty mailbox holding up to [`DEFAULT_MAX_REPORTS`] reports.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty mailbox holding up to `max_reports` reports. Zero is
    /// treated as one.
    #[must_use]
    pub fn with_capacity(max_reports: usize) -> Self {
        let max_reports = max_reports.max(1);
        Self {
            reports: Mutex::new(VecDeque::with_capacity(max_reports.min(1024))),
            max_reports,
        }
    }

    /// Maximum number of reports retained.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.max_reports
    }

    /// Latest report for a task id.
    #[must_use]
    pub fn fetch(&self, task_id: &str) -> Option<TaskReport> {
        self.reports
            .lock()
            .iter()
            .rev()
            .find(|r| r.task_id == task_id)
            .cloned()
    }

    /// Up to `limit` reports, oldest first, optionally only those finished at
    /// or after `since_ms`.
    #[must_use]
    pub fn fetch_since(&self, since_ms: Option<u128>, limit: usize) -> Vec<TaskReport> {
        self.reports
            .lock()
            .iter()
            .filter(|r| since_ms.is_none_or(|s| r.finished_at_ms >= s))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Reports whose execution returned an error.
    #[must_use]
    pub fn failures(&self) -> Vec<TaskReport> {
        self.reports
            .lock()
            .iter()
            .filter(|r| !r.succeeded())
            .cloned()
            .collect()
    }

    /// Remove and return every report.
    pub fn drain(&self) -> Vec<TaskReport> {
        self.reports.lock().drain(..).collect()
    }

    /// Number of stored reports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    /// Whether no report is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Mailbox for InMemoryMailbox {
    fn deliver(&self, report: TaskReport) -> Result<(), MailboxError> {
        let mut reports = self.reports.lock();
        if reports.len() == self.max_reports {
            reports.pop_front();
        }
        reports.push_back(report);
        Ok(())
    }
}
