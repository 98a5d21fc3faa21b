use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of the complaint a conversation belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComplaintId(pub String);

/// Opaque user id of a chat party (customer or employee).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyId(pub String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(ComplaintId);
string_id!(PartyId);

/// Who originated a message, relative to the local party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Sent,
    Received,
}

/// Delivery state of a message as far as the local party knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMarker {
    /// Optimistic echo, not yet confirmed by the server.
    LocalPending,
    /// Locally originated and accepted by the server.
    LocalConfirmed,
    /// Originated on the other side of the channel.
    Remote,
}

/// One chat entry of a complaint conversation.
///
/// `content`, `timestamp` and `direction` are fixed at construction. Only the
/// delivery marker may advance (pending to confirmed) after the fact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    conversation_id: ComplaintId,
    sender_identity: Option<PartyId>,
    sender_display_name: Option<String>,
    content: String,
    direction: Direction,
    timestamp: DateTime<Utc>,
    delivery_marker: DeliveryMarker,
    correlation_id: Option<String>,
}

impl Message {
    /// Message that arrived from the counterpart over the live channel.
    pub fn received(
        conversation_id: ComplaintId,
        sender_identity: Option<PartyId>,
        sender_display_name: Option<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id,
            sender_identity,
            sender_display_name,
            content: content.into(),
            direction: Direction::Received,
            timestamp: Utc::now(),
            delivery_marker: DeliveryMarker::Remote,
            correlation_id: None,
        }
    }

    /// Locally typed message; gets a fresh correlation id.
    pub fn outgoing(
        conversation_id: ComplaintId,
        sender_identity: PartyId,
        sender_display_name: Option<String>,
        content: impl Into<String>,
        delivery_marker: DeliveryMarker,
    ) -> Self {
        Self {
            conversation_id,
            sender_identity: Some(sender_identity),
            sender_display_name,
            content: content.into(),
            direction: Direction::Sent,
            timestamp: Utc::now(),
            delivery_marker,
            correlation_id: Some(Uuid::new_v4().to_string()),
        }
    }

    /// Fully specified message, used when hydrating server records.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        conversation_id: ComplaintId,
        sender_identity: Option<PartyId>,
        sender_display_name: Option<String>,
        content: impl Into<String>,
        direction: Direction,
        timestamp: DateTime<Utc>,
        delivery_marker: DeliveryMarker,
        correlation_id: Option<String>,
    ) -> Self {
        Self {
            conversation_id,
            sender_identity,
            sender_display_name,
            content: content.into(),
            direction,
            timestamp,
            delivery_marker,
            correlation_id,
        }
    }

    pub fn conversation_id(&self) -> &ComplaintId {
        &self.conversation_id
    }

    pub fn sender_identity(&self) -> Option<&PartyId> {
        self.sender_identity.as_ref()
    }

    pub fn sender_display_name(&self) -> Option<&str> {
        self.sender_display_name.as_deref()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn delivery_marker(&self) -> DeliveryMarker {
        self.delivery_marker
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn is_pending(&self) -> bool {
        self.delivery_marker == DeliveryMarker::LocalPending
    }

    /// Pending -> confirmed. Any other marker is left untouched.
    pub(crate) fn confirm(&mut self) -> bool {
        if self.delivery_marker == DeliveryMarker::LocalPending {
            self.delivery_marker = DeliveryMarker::LocalConfirmed;
            true
        } else {
            false
        }
    }
}

/// State of the live channel handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    Errored,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
            ConnectionState::Errored => "errored",
        };
        f.write_str(label)
    }
}

/// The conversation a live channel is currently bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelBinding {
    /// Local party; the channel endpoint is always this party's own.
    pub owner: PartyId,
    pub counterpart: PartyId,
    pub complaint_id: ComplaintId,
    /// Label shown on received messages (the customer's full name).
    pub counterpart_display_name: Option<String>,
}

impl ChannelBinding {
    pub fn new(
        owner: impl Into<PartyId>,
        counterpart: impl Into<PartyId>,
        complaint_id: impl Into<ComplaintId>,
    ) -> Self {
        Self {
            owner: owner.into(),
            counterpart: counterpart.into(),
            complaint_id: complaint_id.into(),
            counterpart_display_name: None,
        }
    }
}

/// Severity of a user-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Toast-style notification for the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}
