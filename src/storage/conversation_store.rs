//! Conversation store - per-complaint, append-only message history

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::common::{ComplaintId, Direction, Message};
use crate::error::Result;

/// Source of previously exchanged messages for a complaint.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn fetch_history(&self, complaint_id: &ComplaintId) -> Result<Vec<Message>>;
}

/// Ordered message history of one complaint. Insertion order is display order.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// How a history fetch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// History was fetched and stored ahead of anything appended meanwhile.
    Fetched(usize),
    /// The fetch failed; an empty conversation was created.
    FetchFailed,
}

/// Session-lifetime store of conversations keyed by complaint.
#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: HashMap<ComplaintId, Conversation>,
    loading: HashSet<ComplaintId>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, complaint_id: &ComplaintId) -> bool {
        self.conversations.contains_key(complaint_id)
    }

    /// Claim the history fetch for a complaint that has never been seen.
    /// Returns `false` when it is already stored or being fetched.
    pub fn begin_load(&mut self, complaint_id: &ComplaintId) -> bool {
        if self.contains(complaint_id) || self.loading.contains(complaint_id) {
            return false;
        }
        self.loading.insert(complaint_id.clone());
        true
    }

    pub fn is_loading(&self, complaint_id: &ComplaintId) -> bool {
        self.loading.contains(complaint_id)
    }

    /// Store the result of a fetch claimed with [`begin_load`](Self::begin_load).
    /// Messages appended while the fetch was running stay after the history.
    /// Results nobody is waiting for (e.g. after [`clear`](Self::clear)) yield `None`.
    pub fn finish_load(
        &mut self,
        complaint_id: &ComplaintId,
        fetched: Result<Vec<Message>>,
    ) -> Option<LoadOutcome> {
        if !self.loading.remove(complaint_id) {
            log::debug!("Discarding unexpected history for complaint {complaint_id}");
            return None;
        }

        let conversation = self.conversations.entry(complaint_id.clone()).or_default();
        match fetched {
            Ok(mut history) => {
                let count = history.len();
                history.append(&mut conversation.messages);
                conversation.messages = history;
                log::info!("Loaded {count} messages for complaint {complaint_id}");
                Some(LoadOutcome::Fetched(count))
            }
            Err(err) => {
                log::warn!("No server history for complaint {complaint_id}, starting empty: {err}");
                Some(LoadOutcome::FetchFailed)
            }
        }
    }

    /// Append to the conversation, creating it on first use. Returns the new length.
    pub fn append(&mut self, complaint_id: &ComplaintId, message: Message) -> usize {
        let conversation = self.conversations.entry(complaint_id.clone()).or_default();
        conversation.messages.push(message);
        conversation.messages.len()
    }

    pub fn messages_for(&self, complaint_id: &ComplaintId) -> &[Message] {
        self.conversations
            .get(complaint_id)
            .map(Conversation::messages)
            .unwrap_or(&[])
    }

    pub fn len_of(&self, complaint_id: &ComplaintId) -> usize {
        self.conversations
            .get(complaint_id)
            .map(Conversation::len)
            .unwrap_or(0)
    }

    /// Promote the oldest pending sent message carrying `content` to confirmed.
    /// Returns its correlation id.
    pub fn confirm_oldest_pending(
        &mut self,
        complaint_id: &ComplaintId,
        content: &str,
    ) -> Option<String> {
        let conversation = self.conversations.get_mut(complaint_id)?;
        let message = conversation.messages.iter_mut().find(|message| {
            message.direction() == Direction::Sent
                && message.is_pending()
                && message.content() == content
        })?;
        message.confirm();
        message.correlation_id().map(str::to_string)
    }

    /// Full session reset.
    pub fn clear(&mut self) {
        self.conversations.clear();
        self.loading.clear();
    }
}
