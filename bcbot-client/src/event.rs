// ABOUTME: Inbound event records delivered by a connected chat session.
// ABOUTME: Payloads stay opaque JSON; only the kind is interpreted by the session manager.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::types::Member;

/// Category of an inbound notification from the chat service
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Chat, emote or whisper delivered to the current room
    ChatMessage,
    /// A member entered or left the current room
    Presence,
    /// Room settings or membership snapshot changed
    RoomUpdate,
    /// Service-side error notification
    Error,
    /// The service closed the connection
    Disconnected,
    /// Anything else the client chooses to forward
    Other,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ChatMessage => "chat_message",
            EventKind::Presence => "presence",
            EventKind::RoomUpdate => "room_update",
            EventKind::Error => "error",
            EventKind::Disconnected => "disconnected",
            EventKind::Other => "other",
        }
    }

    /// Whether receiving this event means the session is no longer usable
    pub fn is_fatal(&self) -> bool {
        matches!(self, EventKind::Disconnected)
    }
}

/// An event as produced by the client, before the buffer assigns it a sequence number
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InboundEvent {
    pub kind: EventKind,
    pub payload: Value,
}

impl InboundEvent {
    pub fn new(kind: EventKind, payload: Value) -> Self {
        Self { kind, payload }
    }

    pub fn chat_message(sender: &Member, content: &str) -> Self {
        Self::new(
            EventKind::ChatMessage,
            json!({
                "Sender": sender.member_number,
                "SenderName": sender.name,
                "Content": content,
                "Type": "Chat",
            }),
        )
    }

    pub fn disconnected(reason: impl Into<String>) -> Self {
        Self::new(EventKind::Disconnected, json!({ "reason": reason.into() }))
    }

    /// Human-readable reason carried by a `Disconnected` or `Error` payload
    pub fn reason(&self) -> Option<&str> {
        self.payload
            .get("reason")
            .or_else(|| self.payload.get("message"))
            .and_then(|v| v.as_str())
    }
}
