// ABOUTME: Data records exchanged with the chat service (config, members, rooms, queries).
// ABOUTME: Room names double as room identifiers on the service.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Everything needed to open one bot session
#[derive(Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub appearance_code: String,
    pub server_url: String,
    pub origin: String,
    /// Chatroom settings (service-native keys such as `Name`, `Limit`) applied after login
    #[serde(default)]
    pub chatroom: Value,
}

// Custom Debug impl to redact the password
impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("appearance_code", &self.appearance_code)
            .field("server_url", &self.server_url)
            .field("origin", &self.origin)
            .field("chatroom", &self.chatroom)
            .finish()
    }
}

/// A character on the service, identified by member number
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    pub member_number: i64,
    pub name: String,
}

impl Member {
    pub fn new(member_number: i64, name: impl Into<String>) -> Self {
        Self {
            member_number,
            name: name.into(),
        }
    }
}

/// Snapshot of a chatroom as reported by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub locked: bool,
}

impl RoomSummary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            members: Vec::new(),
            limit: None,
            private: false,
            locked: false,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    pub fn is_full(&self) -> bool {
        self.limit
            .map(|limit| self.members.len() >= limit as usize)
            .unwrap_or(false)
    }
}

/// What the client reports once login completes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub player: Member,
    /// Room entered while applying the configured chatroom settings
    pub chatroom: Option<RoomSummary>,
}

/// Chatroom search filter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomQuery {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub include_full: bool,
}

fn default_room_limit() -> u32 {
    10
}

/// Settings for a chatroom the bot creates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomParams {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_room_limit")]
    pub limit: u32,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
}

impl RoomParams {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            limit: default_room_limit(),
            private: false,
            locked: false,
            background: None,
        }
    }

    /// Read service-native chatroom settings (`Name`, `Description`, `Limit`, ...).
    /// Returns None when the settings carry no room name.
    pub fn from_settings(settings: &Value) -> Option<Self> {
        let name = settings.get("Name")?.as_str()?.trim();
        if name.is_empty() {
            return None;
        }
        let mut params = Self::new(name);
        if let Some(description) = settings.get("Description").and_then(|v| v.as_str()) {
            params.description = description.to_string();
        }
        if let Some(limit) = settings.get("Limit").and_then(|v| v.as_u64()) {
            params.limit = limit as u32;
        }
        params.private = settings
            .get("Private")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        params.locked = settings
            .get("Locked")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        params.background = settings
            .get("Background")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        Some(params)
    }
}

/// Chat history request for the current room
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<u32>,
}
