//! Conversation/message store.
//!
//! Conversations are keyed by a canonically sorted participant pair so the
//! same unordered pair always resolves to one document regardless of who
//! initiated it. The message thread and the conversation list are live
//! subscriptions; selecting a new thread always cancels the prior handle
//! before opening the next.

pub mod models;
pub mod store;

pub use models::{Conversation, Message};
pub use store::{ChatState, ChatStore};
