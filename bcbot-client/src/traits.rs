// ABOUTME: Capability traits every chat protocol client implements.
// ABOUTME: ChatClient opens connections; ChatSession exposes the per-connection primitives.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::ClientResult;
use crate::event::InboundEvent;
use crate::types::{BotConfig, HistoryQuery, RoomParams, RoomQuery, RoomSummary, SessionInfo};

/// Entry point of a protocol client: turns a BotConfig into a live session.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Client name for logging and metrics
    fn name(&self) -> &'static str;

    /// Connect, authenticate and apply the configured chatroom settings.
    ///
    /// May take a while (login handshake). Callers bound it with their own timeout.
    async fn connect(&self, config: &BotConfig) -> ClientResult<Connection>;
}

/// Primitives available on a connected session.
///
/// Implementations are not required to be reentrant: `SessionHandle` only
/// ever drives one call at a time.
#[async_trait]
pub trait ChatSession: Send + Sync {
    async fn send_message(&self, text: &str) -> ClientResult<()>;

    async fn search_rooms(&self, query: &RoomQuery) -> ClientResult<Vec<RoomSummary>>;

    async fn create_room(&self, params: &RoomParams) -> ClientResult<RoomSummary>;

    async fn join_room(&self, name: &str) -> ClientResult<RoomSummary>;

    async fn leave_room(&self) -> ClientResult<()>;

    async fn query_account(&self, member_number: i64) -> ClientResult<Value>;

    async fn get_character_data(&self, member_number: i64) -> ClientResult<Value>;

    async fn get_room_member_detail(&self, member_number: i64) -> ClientResult<Value>;

    async fn get_chat_history(&self, query: &HistoryQuery) -> ClientResult<Vec<Value>>;

    /// Close the connection. The inbound event channel closes afterwards.
    async fn disconnect(&self) -> ClientResult<()>;
}

/// A freshly established connection
pub struct Connection {
    pub session: Box<dyn ChatSession>,
    pub info: SessionInfo,
    /// Inbound notifications, delivered while the connection is alive
    pub events: mpsc::Receiver<InboundEvent>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("session", &"<ChatSession>")
            .field("info", &self.info)
            .finish()
    }
}
