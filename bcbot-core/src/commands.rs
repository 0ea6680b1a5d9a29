// ABOUTME: Typed command records for dispatcher operations and their argument validation.
// ABOUTME: Validation runs before any adapter call so malformed input never reaches the service.

use bcbot_client::{HistoryQuery, RoomParams, RoomQuery};
use serde::{Deserialize, Serialize};

use crate::error::{BotError, BotResult};

pub const MAX_MESSAGE_LEN: usize = 1000;
pub const MAX_ROOM_NAME_LEN: usize = 20;
pub const MAX_ROOM_DESCRIPTION_LEN: usize = 100;
pub const MIN_ROOM_LIMIT: u32 = 2;
pub const MAX_ROOM_LIMIT: u32 = 20;
pub const MAX_HISTORY_LIMIT: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendChatMessage {
    #[serde(alias = "message")]
    pub text: String,
}

impl SendChatMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn validate(&self) -> BotResult<()> {
        if self.text.trim().is_empty() {
            return Err(BotError::invalid("message must not be empty"));
        }
        let len = self.text.chars().count();
        if len > MAX_MESSAGE_LEN {
            return Err(BotError::invalid(format!(
                "message is {} characters, maximum is {}",
                len, MAX_MESSAGE_LEN
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinChatroom {
    #[serde(alias = "name", alias = "room")]
    pub id: String,
}

impl JoinChatroom {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Returns the trimmed room name
    pub fn validate(&self) -> BotResult<&str> {
        validate_room_name(&self.id)
    }
}

/// Account and member lookups by member number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberLookup {
    #[serde(alias = "id", alias = "member_id")]
    pub member_number: i64,
}

impl MemberLookup {
    pub fn validate(&self) -> BotResult<i64> {
        if self.member_number <= 0 {
            return Err(BotError::invalid(format!(
                "member number must be positive, got {}",
                self.member_number
            )));
        }
        Ok(self.member_number)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentEventsQuery {
    #[serde(default)]
    pub since: Option<u64>,
    #[serde(default)]
    pub limit: Option<usize>,
}

pub fn validate_room_name(name: &str) -> BotResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(BotError::invalid("room name must not be empty"));
    }
    if name.chars().count() > MAX_ROOM_NAME_LEN {
        return Err(BotError::invalid(format!(
            "room name must be at most {} characters",
            MAX_ROOM_NAME_LEN
        )));
    }
    if name.chars().any(|c| c.is_control()) {
        return Err(BotError::invalid("room name contains control characters"));
    }
    Ok(name)
}

pub fn validate_search(query: &RoomQuery) -> BotResult<()> {
    if query.query.chars().count() > MAX_ROOM_NAME_LEN {
        return Err(BotError::invalid(format!(
            "search query must be at most {} characters",
            MAX_ROOM_NAME_LEN
        )));
    }
    Ok(())
}

pub fn validate_room_params(params: &RoomParams) -> BotResult<()> {
    validate_room_name(&params.name)?;
    if params.name.trim() != params.name {
        return Err(BotError::invalid(
            "room name must not start or end with whitespace",
        ));
    }
    if params.description.chars().count() > MAX_ROOM_DESCRIPTION_LEN {
        return Err(BotError::invalid(format!(
            "room description must be at most {} characters",
            MAX_ROOM_DESCRIPTION_LEN
        )));
    }
    if !(MIN_ROOM_LIMIT..=MAX_ROOM_LIMIT).contains(&params.limit) {
        return Err(BotError::invalid(format!(
            "room limit must be between {} and {}, got {}",
            MIN_ROOM_LIMIT, MAX_ROOM_LIMIT, params.limit
        )));
    }
    Ok(())
}

pub fn validate_history(query: &HistoryQuery) -> BotResult<()> {
    match query.limit {
        Some(limit) if limit == 0 || limit > MAX_HISTORY_LIMIT => Err(BotError::invalid(format!(
            "history limit must be between 1 and {}, got {}",
            MAX_HISTORY_LIMIT, limit
        ))),
        _ => Ok(()),
    }
}
