use super::types::{ComplaintId, ConnectionState, Message, Notice, PartyId};

/// Events the chat client emits up to the view.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// A message was appended; the view should scroll to the latest entry.
    MessagesChanged {
        complaint_id: ComplaintId,
        len: usize,
        message: Message,
    },
    /// History for a conversation became available.
    HistoryLoaded {
        complaint_id: ComplaintId,
        len: usize,
    },
    /// A pending message was acknowledged by an echo from the server.
    MessageConfirmed {
        complaint_id: ComplaintId,
        correlation_id: String,
    },
    ConnectionChanged {
        counterpart: PartyId,
        state: ConnectionState,
    },
    PresenceChanged {
        counterpart: PartyId,
        online: bool,
    },
    /// Transient typing signal; never persisted.
    Typing {
        complaint_id: ComplaintId,
        who: String,
    },
    /// The compose input was cleared after a send attempt.
    DraftCleared,
    Notice(Notice),
}
