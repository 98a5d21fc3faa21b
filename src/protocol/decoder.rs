//! Inbound frame classification.
//!
//! A frame is offered to an ordered list of matchers; the first matcher that
//! claims it decides the outcome. New frame shapes are added as new matchers
//! without touching the existing ones.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::common::{ComplaintId, Message, PartyId};

static TYPING_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(?:(?P<who>.*) )?is typing\.\.\.\s*$").expect("typing pattern is valid")
});

const SENDER_SEPARATOR: &str = ": ";

/// The conversation an inbound frame is decoded against.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    pub complaint_id: &'a ComplaintId,
    pub counterpart: &'a PartyId,
    pub counterpart_display_name: Option<&'a str>,
}

impl FrameContext<'_> {
    fn received(&self, sender: Option<PartyId>, content: &str) -> Message {
        Message::received(
            self.complaint_id.clone(),
            sender,
            self.counterpart_display_name.map(str::to_string),
            content,
        )
    }
}

/// Why a frame produced no message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Unparseable or structurally wrong frame.
    Malformed(String),
    /// Attributed to someone other than the active counterpart.
    Misattributed { sender: String },
    /// Nothing left to show after parsing.
    EmptyContent,
}

/// Outcome of decoding one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Message(Message),
    /// Transient typing signal; carries whatever preceded the suffix.
    Typing { who: String },
    Dropped(DropReason),
}

impl Decoded {
    pub fn into_message(self) -> Option<Message> {
        match self {
            Decoded::Message(message) => Some(message),
            _ => None,
        }
    }
}

/// One step of the decode pipeline. Returns `None` to pass the frame on.
pub trait FrameMatcher: Send + Sync {
    fn name(&self) -> &'static str;
    fn decode(&self, frame: &str, ctx: &FrameContext<'_>) -> Option<Decoded>;
}

/// `{"message": "..."}` frames, trusted as coming from the counterpart.
pub struct StructuredEnvelope;

impl FrameMatcher for StructuredEnvelope {
    fn name(&self) -> &'static str {
        "structured"
    }

    fn decode(&self, frame: &str, ctx: &FrameContext<'_>) -> Option<Decoded> {
        let Ok(Value::Object(map)) = serde_json::from_str::<Value>(frame) else {
            return None;
        };
        let decoded = match map.get("message") {
            Some(Value::String(text)) if text.trim().is_empty() => {
                Decoded::Dropped(DropReason::EmptyContent)
            }
            Some(Value::String(text)) => Decoded::Message(ctx.received(None, text)),
            _ => Decoded::Dropped(DropReason::Malformed(
                "JSON frame without a string `message` field".to_string(),
            )),
        };
        Some(decoded)
    }
}

/// `"<who> is typing..."` frames.
pub struct TypingIndicator;

impl FrameMatcher for TypingIndicator {
    fn name(&self) -> &'static str {
        "typing"
    }

    fn decode(&self, frame: &str, _ctx: &FrameContext<'_>) -> Option<Decoded> {
        let captures = TYPING_PATTERN.captures(frame)?;
        let who = captures
            .name("who")
            .map(|found| found.as_str().trim().to_string())
            .unwrap_or_default();
        Some(Decoded::Typing { who })
    }
}

/// `"<identity>: <text>"` frames; only the active counterpart is accepted.
pub struct AttributedText;

impl FrameMatcher for AttributedText {
    fn name(&self) -> &'static str {
        "attributed"
    }

    fn decode(&self, frame: &str, ctx: &FrameContext<'_>) -> Option<Decoded> {
        let (sender, content) = frame.split_once(SENDER_SEPARATOR)?;
        let expected = ctx.counterpart.as_str();
        if sender != expected && !frame.starts_with(expected) {
            return Some(Decoded::Dropped(DropReason::Misattributed {
                sender: sender.to_string(),
            }));
        }
        if content.trim().is_empty() {
            return Some(Decoded::Dropped(DropReason::EmptyContent));
        }
        Some(Decoded::Message(
            ctx.received(Some(PartyId::from(sender)), content),
        ))
    }
}

/// Anything else: the whole text, without sender attribution.
pub struct UnattributedText;

impl FrameMatcher for UnattributedText {
    fn name(&self) -> &'static str {
        "unattributed"
    }

    fn decode(&self, frame: &str, ctx: &FrameContext<'_>) -> Option<Decoded> {
        if frame.trim().is_empty() {
            return Some(Decoded::Dropped(DropReason::EmptyContent));
        }
        Some(Decoded::Message(ctx.received(None, frame)))
    }
}

/// Ordered matcher pipeline.
pub struct FrameDecoder {
    matchers: Vec<Box<dyn FrameMatcher>>,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self {
            matchers: vec![
                Box::new(StructuredEnvelope),
                Box::new(TypingIndicator),
                Box::new(AttributedText),
                Box::new(UnattributedText),
            ],
        }
    }
}

impl FrameDecoder {
    pub fn empty() -> Self {
        Self {
            matchers: Vec::new(),
        }
    }

    /// Append a matcher at the end of the pipeline.
    pub fn with_matcher(mut self, matcher: impl FrameMatcher + 'static) -> Self {
        self.matchers.push(Box::new(matcher));
        self
    }

    /// Insert a matcher ahead of every existing one.
    pub fn with_leading_matcher(mut self, matcher: impl FrameMatcher + 'static) -> Self {
        self.matchers.insert(0, Box::new(matcher));
        self
    }

    pub fn decode(&self, frame: &str, ctx: &FrameContext<'_>) -> Decoded {
        for matcher in &self.matchers {
            if let Some(decoded) = matcher.decode(frame, ctx) {
                match &decoded {
                    Decoded::Message(_) => {
                        log::debug!("Frame decoded by `{}` matcher", matcher.name());
                    }
                    Decoded::Typing { who } => {
                        log::debug!("Typing indicator from `{who}`");
                    }
                    Decoded::Dropped(DropReason::Malformed(reason)) => {
                        log::warn!("Dropping malformed frame ({reason}): {frame:?}");
                    }
                    Decoded::Dropped(DropReason::Misattributed { sender }) => {
                        log::debug!(
                            "Dropping frame from `{sender}`, expected `{}`",
                            ctx.counterpart
                        );
                    }
                    Decoded::Dropped(DropReason::EmptyContent) => {
                        log::debug!("Dropping empty frame");
                    }
                }
                return decoded;
            }
        }
        log::warn!("No matcher claimed frame: {frame:?}");
        Decoded::Dropped(DropReason::Malformed("unclaimed frame".to_string()))
    }
}
