//! Mailbox forwarding reports into a crossbeam channel.

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::core::{Mailbox, MailboxError, TaskReport};

/// Forwards each report to a channel so a consumer can react as tasks finish.
#[derive(Debug, Clone)]
pub struct ChannelMailbox {
    tx: Sender<TaskReport>,
}

impl ChannelMailbox {
    /// Create a mailbox and the receiver its reports arrive on.
    #[must_use]
    pub fn new() -> (Self, Receiver<TaskReport>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }
}

impl Mailbox for ChannelMailbox {
    fn deliver(&self, report: TaskReport) -> Result<(), MailboxError> {
        self.tx.send(report).map_err(|_| MailboxError::Closed)
    }
}
