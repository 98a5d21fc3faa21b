//! Wire shapes exchanged with the chat service and the complaints API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::{ComplaintId, DeliveryMarker, Direction, Message, PartyId};

/// Typed payload sent over the open channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEnvelope {
    pub sender: String,
    pub receiver: String,
    pub content: String,
}

impl OutboundEnvelope {
    pub fn new(sender: &PartyId, receiver: &PartyId, content: impl Into<String>) -> Self {
        Self {
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            content: content.into(),
        }
    }
}

/// Numeric timestamps at or above this are epoch milliseconds, below it seconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// Body of the fallback `POST /complaints/{id}/messages`.
#[derive(Debug, Clone, Serialize)]
pub struct FallbackRequest<'a> {
    pub message: &'a str,
}

/// Loosely shaped message record returned by the complaints API.
///
/// Field names vary between endpoints, so every known alias is accepted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageRecord {
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    text: Option<Value>,
    #[serde(default)]
    message: Option<Value>,
    #[serde(default)]
    body: Option<Value>,
    #[serde(default)]
    timestamp: Option<Value>,
    #[serde(default)]
    sent_at: Option<Value>,
    #[serde(default)]
    created_at: Option<Value>,
    #[serde(default)]
    sender: Option<Value>,
    #[serde(default)]
    sender_id: Option<Value>,
    #[serde(default)]
    user_id: Option<Value>,
    #[serde(default)]
    sender_name: Option<Value>,
    #[serde(default)]
    user_fullname: Option<Value>,
    #[serde(default)]
    name: Option<Value>,
}

impl MessageRecord {
    pub fn content(&self) -> Option<String> {
        [&self.content, &self.text, &self.message, &self.body]
            .into_iter()
            .flatten()
            .filter_map(scalar_text)
            .find(|text| !text.trim().is_empty())
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        [&self.timestamp, &self.sent_at, &self.created_at]
            .into_iter()
            .flatten()
            .find_map(parse_timestamp)
    }

    pub fn sender(&self) -> Option<PartyId> {
        [&self.sender, &self.sender_id, &self.user_id]
            .into_iter()
            .flatten()
            .filter_map(scalar_text)
            .find(|id| !id.is_empty())
            .map(PartyId::from)
    }

    pub fn display_name(&self) -> Option<String> {
        [&self.sender_name, &self.user_fullname, &self.name]
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .find(|name| !name.trim().is_empty())
            .map(str::to_string)
    }

    /// Normalise into a [`Message`] as seen by `owner`. Records without
    /// usable content yield `None`.
    pub fn into_message(self, conversation_id: &ComplaintId, owner: &PartyId) -> Option<Message> {
        let content = self.content()?;
        let sender = self.sender();
        let direction = match &sender {
            Some(sender) if sender == owner => Direction::Sent,
            _ => Direction::Received,
        };
        let marker = match direction {
            Direction::Sent => DeliveryMarker::LocalConfirmed,
            Direction::Received => DeliveryMarker::Remote,
        };
        let timestamp = self.timestamp().unwrap_or_else(Utc::now);
        let display_name = self.display_name();
        Some(Message::from_parts(
            conversation_id.clone(),
            sender,
            display_name,
            content,
            direction,
            timestamp,
            marker,
            None,
        ))
    }
}

/// Extract the record collection from a history response: a bare array,
/// `{"results": [...]}`, or a single record.
pub fn records_from_history(body: Value) -> Vec<MessageRecord> {
    match body {
        Value::Array(items) => items.into_iter().filter_map(record_from_value).collect(),
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(items)) => items.into_iter().filter_map(record_from_value).collect(),
            Some(single @ Value::Object(_)) => record_from_value(single).into_iter().collect(),
            Some(_) | None => record_from_value(Value::Object(map)).into_iter().collect(),
        },
        Value::Null => Vec::new(),
        other => {
            log::debug!("Ignoring non-record history body: {other}");
            Vec::new()
        }
    }
}

/// Pick the created record out of a fallback POST response. Only object
/// shaped `message` or `results` entries count; a bare status string does not.
pub fn record_from_post_response(body: Value) -> Option<MessageRecord> {
    let Value::Object(mut map) = body else {
        return None;
    };
    if let Some(found @ Value::Object(_)) = map.remove("message") {
        return record_from_value(found);
    }
    match map.remove("results") {
        Some(found @ Value::Object(_)) => record_from_value(found),
        Some(Value::Array(items)) => items.into_iter().rev().find_map(record_from_value),
        _ => None,
    }
}

/// Server supplied error text from a failed response body.
pub fn error_message(body: &Value) -> Option<String> {
    ["message", "detail", "error"]
        .into_iter()
        .find_map(|key| body.get(key).and_then(Value::as_str))
        .map(str::to_string)
}

fn record_from_value(value: Value) -> Option<MessageRecord> {
    match serde_json::from_value::<MessageRecord>(value) {
        Ok(record) => Some(record),
        Err(err) => {
            log::debug!("Skipping malformed message record: {err}");
            None
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// RFC 3339 or naive (UTC) strings, or epoch seconds / milliseconds.
/// Anything else reads as absent.
fn parse_timestamp(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::String(text) => parse_timestamp_text(text),
        Value::Number(number) => {
            let epoch = number.as_i64().or_else(|| number.as_f64().map(|value| value as i64))?;
            if epoch.abs() >= EPOCH_MILLIS_THRESHOLD {
                DateTime::from_timestamp_millis(epoch)
            } else {
                DateTime::from_timestamp(epoch, 0)
            }
        }
        _ => None,
    }
}

fn parse_timestamp_text(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    // Naive timestamps from the API are UTC.
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}
