pub mod conversation_store;
pub mod presence;

pub use conversation_store::{Conversation, ConversationStore, HistorySource, LoadOutcome};
pub use presence::PresenceTracker;
