//! Shared identifier types used across all courier crates.

pub mod types;

pub use types::{AgentId, ChatId, GroupId, MessageId};
