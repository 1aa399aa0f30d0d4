//! Conversation data model
//!
//! The turn log and its status flags: the single source of truth the
//! orchestrator decides from and the UI renders.

mod store;
mod turn;

pub use store::{ConversationStatus, ConversationStore, TokenBudget};
pub use turn::{Speaker, Termination, Turn};
