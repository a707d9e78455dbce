//! Mailbox backends.

pub mod channel;
pub mod memory;

pub use channel::ChannelMailbox;
pub use memory::InMemoryMailbox;
