//! Infrastructure adapters for task report delivery.

pub mod mailbox;

pub use mailbox::{ChannelMailbox, InMemoryMailbox};
