use std::collections::HashMap;

use crate::common::{
    ChatEvent, ComplaintId, ConnectionState, DeliveryMarker, Direction, Message, Notice,
    NoticeLevel, PartyId,
};

const MAX_NOTICES: usize = 100;

/// Local render state of the terminal view.
#[derive(Debug, Default)]
pub struct AppState {
    /// Index of the latest rendered message per complaint (scroll target).
    pub scroll_to: HashMap<ComplaintId, usize>,
    pub presence: HashMap<PartyId, bool>,
    pub connection: Option<ConnectionState>,
    pub typing: Option<String>,
    pub notices: Vec<Notice>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an event and return the lines to print for it.
    pub fn apply(&mut self, event: &ChatEvent) -> Vec<String> {
        match event {
            ChatEvent::MessagesChanged {
                complaint_id,
                len,
                message,
            } => {
                self.scroll_to.insert(complaint_id.clone(), len.saturating_sub(1));
                if message.direction() == Direction::Received {
                    self.typing = None;
                }
                vec![format_message(message)]
            }
            ChatEvent::HistoryLoaded { complaint_id, len } => {
                self.scroll_to.insert(complaint_id.clone(), len.saturating_sub(1));
                if *len == 0 {
                    vec!["No messages yet. Start the conversation!".to_string()]
                } else {
                    vec![format!("-- {len} earlier messages for complaint {complaint_id}")]
                }
            }
            ChatEvent::MessageConfirmed { correlation_id, .. } => {
                vec![format!("-- delivered ({correlation_id})")]
            }
            ChatEvent::ConnectionChanged { counterpart, state } => {
                self.connection = Some(*state);
                vec![format!("-- chat with {counterpart}: {state}")]
            }
            ChatEvent::PresenceChanged {
                counterpart,
                online,
            } => {
                self.presence.insert(counterpart.clone(), *online);
                let label = if *online { "● Online" } else { "○ Offline" };
                vec![format!("{label}: {counterpart}")]
            }
            ChatEvent::Typing { who, .. } => {
                self.typing = Some(who.clone());
                if who.is_empty() {
                    vec!["... typing".to_string()]
                } else {
                    vec![format!("{who} is typing...")]
                }
            }
            ChatEvent::DraftCleared => Vec::new(),
            ChatEvent::Notice(notice) => {
                self.notices.push(notice.clone());
                if self.notices.len() > MAX_NOTICES {
                    self.notices.remove(0);
                }
                let tag = match notice.level {
                    NoticeLevel::Success => "ok",
                    NoticeLevel::Error => "error",
                };
                vec![format!("[{tag}] {}", notice.text)]
            }
        }
    }

    pub fn is_online(&self, counterpart: &PartyId) -> bool {
        self.presence.get(counterpart).copied().unwrap_or(false)
    }
}

pub fn format_message(message: &Message) -> String {
    let who = match message.direction() {
        Direction::Sent => "You".to_string(),
        Direction::Received => message
            .sender_display_name()
            .map(str::to_string)
            .or_else(|| message.sender_identity().map(ToString::to_string))
            .unwrap_or_else(|| "Customer".to_string()),
    };
    let marker = match message.delivery_marker() {
        DeliveryMarker::LocalPending => " (sending)",
        DeliveryMarker::LocalConfirmed => " ✓ Sent",
        DeliveryMarker::Remote => "",
    };
    format!(
        "[{}] {who}: {}{marker}",
        message.timestamp().format("%H:%M:%S"),
        message.content()
    )
}
