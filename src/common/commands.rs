use super::types::{ComplaintId, PartyId};

/// Commands the view sends down to the chat client.
#[derive(Debug, Clone)]
pub enum ChatCommand {
    /// Open (or switch to) a conversation; tears down any live channel first.
    OpenConversation {
        complaint_id: ComplaintId,
        counterpart: PartyId,
        counterpart_name: Option<String>,
    },
    /// Close the conversation view and its live channel.
    CloseConversation,
    /// Replace the compose-input draft.
    UpdateDraft(String),
    /// Send the current draft to the active counterpart.
    SubmitDraft,
    /// Send explicit content to the active counterpart.
    SendMessage(String),
    /// Drop all conversations and presence (full session reset).
    ResetSession,
}
