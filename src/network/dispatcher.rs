//! Outbound dispatcher: live channel when open, REST fallback otherwise.
//! Typed content is never lost; every accepted send ends up in history.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::common::{ComplaintId, DeliveryMarker, Direction, Message, PartyId};
use crate::error::ChatError;
use crate::protocol::{MessageRecord, OutboundEnvelope};
use crate::storage::ConversationStore;

use super::connection::ConnectionManager;
use super::http::ComplaintApi;

/// One send request, with the conversation captured at call time.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub complaint_id: ComplaintId,
    pub owner: PartyId,
    pub counterpart: PartyId,
    pub content: String,
    pub sender_display_name: Option<String>,
}

/// Result of handing a message to the dispatcher.
pub enum Dispatch {
    /// Empty or whitespace-only content; nothing happened.
    Rejected,
    /// Sent over the live channel; the optimistic echo is already in the store.
    Echoed(Message),
    /// The channel is not open; the message must go through the fallback.
    Deferred(FallbackSend),
}

/// A pending fallback POST. Runs to completion independently of the view.
pub struct FallbackSend {
    api: Arc<dyn ComplaintApi>,
    outgoing: OutgoingMessage,
}

/// What a fallback send appends, and the error to surface if it failed.
#[derive(Debug)]
pub struct FallbackOutcome {
    pub message: Message,
    pub error: Option<ChatError>,
}

impl FallbackSend {
    pub fn complaint_id(&self) -> &ComplaintId {
        &self.outgoing.complaint_id
    }

    pub async fn deliver(self) -> FallbackOutcome {
        let OutgoingMessage {
            complaint_id,
            owner,
            content,
            sender_display_name,
            ..
        } = self.outgoing;

        match self.api.post_message(&complaint_id, &content).await {
            Ok(Some(record)) => FallbackOutcome {
                message: confirmed_from_record(
                    record,
                    complaint_id,
                    owner,
                    content,
                    sender_display_name,
                ),
                error: None,
            },
            Ok(None) => FallbackOutcome {
                message: Message::outgoing(
                    complaint_id,
                    owner,
                    sender_display_name,
                    content,
                    DeliveryMarker::LocalConfirmed,
                ),
                error: None,
            },
            Err(err) => {
                log::warn!("Fallback send for complaint {complaint_id} failed: {err}");
                FallbackOutcome {
                    message: Message::outgoing(
                        complaint_id,
                        owner,
                        sender_display_name,
                        content,
                        DeliveryMarker::LocalPending,
                    ),
                    error: Some(err),
                }
            }
        }
    }
}

/// The server's record wins where it has data; the typed content fills gaps.
fn confirmed_from_record(
    record: MessageRecord,
    complaint_id: ComplaintId,
    owner: PartyId,
    typed: String,
    display_name: Option<String>,
) -> Message {
    Message::from_parts(
        complaint_id,
        Some(owner),
        record.display_name().or(display_name),
        record.content().unwrap_or(typed),
        Direction::Sent,
        record.timestamp().unwrap_or_else(Utc::now),
        DeliveryMarker::LocalConfirmed,
        Some(Uuid::new_v4().to_string()),
    )
}

pub struct OutboundDispatcher {
    api: Arc<dyn ComplaintApi>,
}

impl OutboundDispatcher {
    pub fn new(api: Arc<dyn ComplaintApi>) -> Self {
        Self { api }
    }

    pub fn dispatch(
        &self,
        outgoing: OutgoingMessage,
        connection: &mut ConnectionManager,
        store: &mut ConversationStore,
    ) -> Dispatch {
        if outgoing.content.trim().is_empty() {
            return Dispatch::Rejected;
        }

        if connection.is_open() {
            let envelope =
                OutboundEnvelope::new(&outgoing.owner, &outgoing.counterpart, &outgoing.content);
            let sent = serde_json::to_string(&envelope)
                .map_err(ChatError::from)
                .and_then(|frame| connection.transmit(frame));
            match sent {
                Ok(()) => {
                    log::debug!(
                        "{} -> {} over live channel (complaint {})",
                        outgoing.owner,
                        outgoing.counterpart,
                        outgoing.complaint_id
                    );
                    let echo = Message::outgoing(
                        outgoing.complaint_id.clone(),
                        outgoing.owner,
                        outgoing.sender_display_name,
                        outgoing.content,
                        DeliveryMarker::LocalPending,
                    );
                    store.append(&outgoing.complaint_id, echo.clone());
                    return Dispatch::Echoed(echo);
                }
                Err(err) => {
                    log::warn!("Live send failed, using fallback transport: {err}");
                }
            }
        }

        Dispatch::Deferred(FallbackSend {
            api: Arc::clone(&self.api),
            outgoing,
        })
    }
}
