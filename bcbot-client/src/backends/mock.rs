// ABOUTME: In-memory chat service for tests and local loopback runs.
// ABOUTME: Scriptable failures and delays, recorded calls, injected events and forced disconnects.
//!
//! # Example
//!
//! ```no_run
//! use bcbot_client::{BotConfig, ChatClient, MockClient, RoomSummary};
//! use serde_json::json;
//!
//! # async fn example() {
//! let mock = MockClient::new()
//!     .with_player(1001, "Helper")
//!     .with_room(RoomSummary::new("Lounge").with_limit(10));
//!
//! let config = BotConfig {
//!     username: "helper".to_string(),
//!     password: "secret".to_string(),
//!     appearance_code: String::new(),
//!     server_url: "https://example.invalid/".to_string(),
//!     origin: "https://example.invalid".to_string(),
//!     chatroom: json!({ "Name": "Lounge" }),
//! };
//!
//! let connection = mock.connect(&config).await.unwrap();
//! assert_eq!(connection.info.chatroom.unwrap().name, "Lounge");
//! assert_eq!(mock.call_count("connect"), 1);
//! # }
//! ```

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::{ClientError, ClientResult};
use crate::event::{EventKind, InboundEvent};
use crate::registry::ClientFactory;
use crate::traits::{ChatClient, ChatSession, Connection};
use crate::types::{
    BotConfig, HistoryQuery, Member, RoomParams, RoomQuery, RoomSummary, SessionInfo,
};

const EVENT_CHANNEL_SIZE: usize = 256;

/// Mock chat client. Clones share state, so a test can keep one clone for
/// scripting and assertions while the session manager owns another.
#[derive(Clone)]
pub struct MockClient {
    shared: Arc<Mutex<MockState>>,
}

struct MockState {
    player: Member,
    rooms: BTreeMap<String, RoomSummary>,
    accounts: HashMap<i64, Value>,
    connect_failure: Option<ClientError>,
    rejections: HashMap<String, ClientError>,
    delays: HashMap<String, Duration>,
    echo: bool,
    calls: Vec<String>,
    sent: Vec<String>,
    history: Vec<Value>,
    current_room: Option<String>,
    connection: Option<u64>,
    next_connection: u64,
    events_tx: Option<mpsc::Sender<InboundEvent>>,
}

impl MockClient {
    /// Create a mock service with a default player and no rooms
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(MockState {
                player: Member::new(1, "MockBot"),
                rooms: BTreeMap::new(),
                accounts: HashMap::new(),
                connect_failure: None,
                rejections: HashMap::new(),
                delays: HashMap::new(),
                echo: true,
                calls: Vec::new(),
                sent: Vec::new(),
                history: Vec::new(),
                current_room: None,
                connection: None,
                next_connection: 0,
                events_tx: None,
            })),
        }
    }

    /// Build from `[client]` options: `player_name`, `member_number`, `rooms`, `echo`
    pub fn from_config(options: &Value) -> Self {
        let member_number = options
            .get("member_number")
            .and_then(|v| v.as_i64())
            .unwrap_or(1);
        let name = options
            .get("player_name")
            .and_then(|v| v.as_str())
            .unwrap_or("MockBot");
        let mut mock = Self::new().with_player(member_number, name);
        if let Some(rooms) = options.get("rooms").and_then(|v| v.as_array()) {
            for room in rooms.iter().filter_map(|r| r.as_str()) {
                mock = mock.with_room(RoomSummary::new(room));
            }
        }
        if options.get("echo").and_then(|v| v.as_bool()) == Some(false) {
            mock = mock.without_echo();
        }
        mock
    }

    /// Factory function for the registry
    pub fn factory() -> ClientFactory {
        Box::new(|options: &Value| {
            Ok(Arc::new(MockClient::from_config(options)) as Arc<dyn ChatClient>)
        })
    }

    pub fn with_player(self, member_number: i64, name: &str) -> Self {
        self.lock().player = Member::new(member_number, name);
        self
    }

    pub fn with_room(self, room: RoomSummary) -> Self {
        self.lock().rooms.insert(room.name.clone(), room);
        self
    }

    pub fn with_account(self, member_number: i64, account: Value) -> Self {
        self.lock().accounts.insert(member_number, account);
        self
    }

    /// Make every connect attempt fail with `error` until cleared
    pub fn fail_connect(self, error: ClientError) -> Self {
        self.set_connect_failure(Some(error));
        self
    }

    /// Make operation `op` (e.g. "join_room", "connect") fail with `error` until cleared
    pub fn reject(self, op: &str, error: ClientError) -> Self {
        self.set_rejection(op, Some(error));
        self
    }

    /// Delay operation `op` before it runs
    pub fn delay(self, op: &str, delay: Duration) -> Self {
        self.set_delay(op, Some(delay));
        self
    }

    /// Do not echo sent chat messages back as inbound events
    pub fn without_echo(self) -> Self {
        self.lock().echo = false;
        self
    }

    pub fn set_connect_failure(&self, error: Option<ClientError>) {
        self.lock().connect_failure = error;
    }

    pub fn set_rejection(&self, op: &str, error: Option<ClientError>) {
        let mut state = self.lock();
        match error {
            Some(error) => state.rejections.insert(op.to_string(), error),
            None => state.rejections.remove(op),
        };
    }

    pub fn set_delay(&self, op: &str, delay: Option<Duration>) {
        let mut state = self.lock();
        match delay {
            Some(delay) => state.delays.insert(op.to_string(), delay),
            None => state.delays.remove(op),
        };
    }

    /// Push an event into the live session's inbound stream.
    /// Returns false when no session is connected or the stream is full.
    pub fn inject_event(&self, event: InboundEvent) -> bool {
        self.lock().emit(event)
    }

    /// Simulate the service dropping the connection: a Disconnected event is
    /// delivered, the stream closes and further calls fail with ConnectionLost.
    pub fn force_disconnect(&self, reason: &str) -> bool {
        let mut state = self.lock();
        let delivered = state.emit(InboundEvent::disconnected(reason));
        state.drop_connection();
        delivered
    }

    /// Close the inbound stream without any notification
    pub fn close_event_stream(&self) {
        self.lock().events_tx = None;
    }

    /// Every operation invoked so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.lock().calls.iter().filter(|c| c.as_str() == op).count()
    }

    pub fn connect_count(&self) -> usize {
        self.call_count("connect")
    }

    /// Number of session primitives invoked (everything except connect)
    pub fn session_call_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.as_str() != "connect")
            .count()
    }

    pub fn sent_messages(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    pub fn current_room(&self) -> Option<String> {
        self.lock().current_room.clone()
    }

    pub fn room(&self, name: &str) -> Option<RoomSummary> {
        self.lock().rooms.get(name).cloned()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connection.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockState {
    fn emit(&self, event: InboundEvent) -> bool {
        match &self.events_tx {
            Some(tx) => tx.try_send(event).is_ok(),
            None => false,
        }
    }

    fn drop_connection(&mut self) {
        self.connection = None;
        self.events_tx = None;
        self.leave_current();
    }

    fn leave_current(&mut self) -> Option<String> {
        let name = self.current_room.take()?;
        let member_number = self.player.member_number;
        if let Some(room) = self.rooms.get_mut(&name) {
            room.members.retain(|m| m.member_number != member_number);
        }
        Some(name)
    }

    fn join(&mut self, name: &str) -> ClientResult<RoomSummary> {
        let room = self
            .rooms
            .get(name)
            .ok_or_else(|| ClientError::Rejected(format!("room not found: {}", name)))?;
        if self.current_room.as_deref() == Some(name) {
            return Ok(room.clone());
        }
        if room.is_full() {
            return Err(ClientError::Rejected(format!("room is full: {}", name)));
        }
        if room.locked {
            return Err(ClientError::Rejected(format!("room is locked: {}", name)));
        }

        self.leave_current();
        let player = self.player.clone();
        let room = self
            .rooms
            .get_mut(name)
            .ok_or_else(|| ClientError::Rejected(format!("room not found: {}", name)))?;
        room.members.push(player);
        let snapshot = room.clone();
        self.current_room = Some(name.to_string());
        self.emit(room_update(&snapshot));
        Ok(snapshot)
    }

    fn create(&mut self, params: &RoomParams) -> ClientResult<RoomSummary> {
        if self.rooms.contains_key(&params.name) {
            return Err(ClientError::Rejected(format!(
                "room already exists: {}",
                params.name
            )));
        }

        self.leave_current();
        let room = RoomSummary {
            name: params.name.clone(),
            description: params.description.clone(),
            members: vec![self.player.clone()],
            limit: Some(params.limit),
            private: params.private,
            locked: params.locked,
        };
        self.rooms.insert(room.name.clone(), room.clone());
        self.current_room = Some(room.name.clone());
        self.emit(room_update(&room));
        Ok(room)
    }

    /// Find a member visible to the player: the player itself or someone in the current room
    fn visible_member(&self, member_number: i64) -> Option<Member> {
        if member_number == self.player.member_number {
            return Some(self.player.clone());
        }
        let room = self.rooms.get(self.current_room.as_deref()?)?;
        room.members
            .iter()
            .find(|m| m.member_number == member_number)
            .cloned()
    }
}

fn room_update(room: &RoomSummary) -> InboundEvent {
    InboundEvent::new(
        EventKind::RoomUpdate,
        serde_json::to_value(room).unwrap_or_else(|_| json!({ "name": room.name })),
    )
}

#[async_trait]
impl ChatClient for MockClient {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn connect(&self, config: &BotConfig) -> ClientResult<Connection> {
        let (delay, failure) = {
            let mut state = self.lock();
            state.calls.push("connect".to_string());
            (
                state.delays.get("connect").copied(),
                state
                    .connect_failure
                    .clone()
                    .or_else(|| state.rejections.get("connect").cloned()),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = failure {
            return Err(error);
        }
        if config.username.trim().is_empty() || config.password.is_empty() {
            return Err(ClientError::AuthRejected("missing credentials".to_string()));
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let mut state = self.lock();
        state.drop_connection();
        state.next_connection += 1;
        let connection = state.next_connection;
        state.connection = Some(connection);
        state.events_tx = Some(tx);

        let chatroom = match RoomParams::from_settings(&config.chatroom) {
            Some(params) if state.rooms.contains_key(&params.name) => {
                Some(state.join(&params.name)?)
            }
            Some(params) => Some(state.create(&params)?),
            None => None,
        };

        tracing::debug!(
            player = %state.player.name,
            chatroom = ?chatroom.as_ref().map(|r| r.name.as_str()),
            "mock session connected"
        );

        Ok(Connection {
            session: Box::new(MockSession {
                shared: Arc::clone(&self.shared),
                connection,
            }),
            info: SessionInfo {
                player: state.player.clone(),
                chatroom,
            },
            events: rx,
        })
    }
}

/// Session half of the mock; bound to one connection id
struct MockSession {
    shared: Arc<Mutex<MockState>>,
    connection: u64,
}

impl MockSession {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record the call, apply scripted delay and rejection, and check liveness
    async fn begin(&self, op: &str) -> ClientResult<()> {
        let (delay, rejection) = {
            let mut state = self.lock();
            state.calls.push(op.to_string());
            if state.connection != Some(self.connection) {
                return Err(ClientError::ConnectionLost(
                    "mock session is disconnected".to_string(),
                ));
            }
            (
                state.delays.get(op).copied(),
                state.rejections.get(op).cloned(),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match rejection {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ChatSession for MockSession {
    async fn send_message(&self, text: &str) -> ClientResult<()> {
        self.begin("send_message").await?;
        let mut state = self.lock();
        let room = state
            .current_room
            .clone()
            .ok_or_else(|| ClientError::Rejected("not in a chatroom".to_string()))?;
        let player = state.player.clone();
        state.sent.push(text.to_string());
        state.history.push(json!({
            "Room": room,
            "Sender": player.member_number,
            "Content": text,
        }));
        if state.echo {
            state.emit(InboundEvent::chat_message(&player, text));
        }
        Ok(())
    }

    async fn search_rooms(&self, query: &RoomQuery) -> ClientResult<Vec<RoomSummary>> {
        self.begin("search_rooms").await?;
        let needle = query.query.trim().to_lowercase();
        let state = self.lock();
        Ok(state
            .rooms
            .values()
            .filter(|room| !room.private)
            .filter(|room| query.include_full || !room.is_full())
            .filter(|room| needle.is_empty() || room.name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn create_room(&self, params: &RoomParams) -> ClientResult<RoomSummary> {
        self.begin("create_room").await?;
        self.lock().create(params)
    }

    async fn join_room(&self, name: &str) -> ClientResult<RoomSummary> {
        self.begin("join_room").await?;
        self.lock().join(name)
    }

    async fn leave_room(&self) -> ClientResult<()> {
        self.begin("leave_room").await?;
        let mut state = self.lock();
        let name = state
            .leave_current()
            .ok_or_else(|| ClientError::Rejected("not in a chatroom".to_string()))?;
        if let Some(room) = state.rooms.get(&name).cloned() {
            state.emit(room_update(&room));
        }
        Ok(())
    }

    async fn query_account(&self, member_number: i64) -> ClientResult<Value> {
        self.begin("query_account").await?;
        let state = self.lock();
        if let Some(account) = state.accounts.get(&member_number) {
            return Ok(account.clone());
        }
        state
            .visible_member(member_number)
            .map(|m| json!({ "MemberNumber": m.member_number, "Name": m.name }))
            .ok_or_else(|| ClientError::Rejected(format!("unknown member: {}", member_number)))
    }

    async fn get_character_data(&self, member_number: i64) -> ClientResult<Value> {
        self.begin("get_character_data").await?;
        let state = self.lock();
        state
            .visible_member(member_number)
            .map(|m| {
                json!({
                    "MemberNumber": m.member_number,
                    "Name": m.name,
                    "Appearance": [],
                })
            })
            .ok_or_else(|| {
                ClientError::Rejected(format!(
                    "member {} is not in the current room",
                    member_number
                ))
            })
    }

    async fn get_room_member_detail(&self, member_number: i64) -> ClientResult<Value> {
        self.begin("get_room_member_detail").await?;
        let state = self.lock();
        let member = state.visible_member(member_number).ok_or_else(|| {
            ClientError::Rejected(format!(
                "member {} is not in the current room",
                member_number
            ))
        })?;
        Ok(json!({
            "MemberNumber": member.member_number,
            "Name": member.name,
            "Room": state.current_room,
            "IsPlayer": member.member_number == state.player.member_number,
        }))
    }

    async fn get_chat_history(&self, query: &HistoryQuery) -> ClientResult<Vec<Value>> {
        self.begin("get_chat_history").await?;
        let state = self.lock();
        let room = state
            .current_room
            .as_deref()
            .ok_or_else(|| ClientError::Rejected("not in a chatroom".to_string()))?;
        let entries: Vec<Value> = state
            .history
            .iter()
            .filter(|entry| entry["Room"] == room)
            .cloned()
            .collect();
        let keep = query
            .limit
            .map(|l| l as usize)
            .unwrap_or(entries.len())
            .min(entries.len());
        Ok(entries[entries.len() - keep..].to_vec())
    }

    /// The connection is always released; a scripted rejection or delay
    /// only affects what the caller observes.
    async fn disconnect(&self) -> ClientResult<()> {
        let (delay, rejection) = {
            let mut state = self.lock();
            state.calls.push("disconnect".to_string());
            if state.connection == Some(self.connection) {
                state.drop_connection();
            }
            (
                state.delays.get("disconnect").copied(),
                state.rejections.get("disconnect").cloned(),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match rejection {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chatroom: Value) -> BotConfig {
        BotConfig {
            username: "bot".to_string(),
            password: "pw".to_string(),
            appearance_code: String::new(),
            server_url: "https://example.invalid/".to_string(),
            origin: "https://example.invalid".to_string(),
            chatroom,
        }
    }

    #[tokio::test]
    async fn test_connect_creates_configured_room() {
        let mock = MockClient::new().with_player(7, "Bot");
        let connection = mock
            .connect(&config(json!({ "Name": "Fresh", "Limit": 4 })))
            .await
            .unwrap();
        let room = connection.info.chatroom.unwrap();
        assert_eq!(room.name, "Fresh");
        assert_eq!(room.limit, Some(4));
        assert_eq!(room.members, vec![Member::new(7, "Bot")]);
        assert_eq!(mock.current_room().as_deref(), Some("Fresh"));
    }

    #[tokio::test]
    async fn test_connect_failure_is_sticky_until_cleared() {
        let mock = MockClient::new().fail_connect(ClientError::Network("down".to_string()));
        assert!(mock.connect(&config(json!({}))).await.is_err());
        assert!(mock.connect(&config(json!({}))).await.is_err());

        mock.set_connect_failure(None);
        assert!(mock.connect(&config(json!({}))).await.is_ok());
        assert_eq!(mock.call_count("connect"), 3);
    }

    #[tokio::test]
    async fn test_missing_credentials_rejected() {
        let mock = MockClient::new();
        let mut cfg = config(json!({}));
        cfg.password = String::new();
        let err = mock.connect(&cfg).await.unwrap_err();
        assert!(matches!(err, ClientError::AuthRejected(_)));
    }

    #[tokio::test]
    async fn test_send_echoes_chat_event() {
        let mock = MockClient::new().with_room(RoomSummary::new("Lounge"));
        let mut connection = mock
            .connect(&config(json!({ "Name": "Lounge" })))
            .await
            .unwrap();

        // Joining the configured room emits a room update first
        let first = connection.events.recv().await.unwrap();
        assert_eq!(first.kind, EventKind::RoomUpdate);

        connection.session.send_message("hello").await.unwrap();
        let echoed = connection.events.recv().await.unwrap();
        assert_eq!(echoed.kind, EventKind::ChatMessage);
        assert_eq!(echoed.payload["Content"], "hello");
        assert_eq!(mock.sent_messages(), vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn test_join_full_room_rejected() {
        let mock = MockClient::new().with_room(
            RoomSummary::new("Packed")
                .with_limit(1)
                .with_member(Member::new(99, "Other")),
        );
        let connection = mock.connect(&config(json!({}))).await.unwrap();
        let err = connection.session.join_room("Packed").await.unwrap_err();
        assert!(matches!(err, ClientError::Rejected(ref m) if m.contains("full")));
    }

    #[tokio::test]
    async fn test_force_disconnect_breaks_session() {
        let mock = MockClient::new();
        let mut connection = mock.connect(&config(json!({}))).await.unwrap();
        assert!(mock.force_disconnect("server restart"));

        let event = connection.events.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::Disconnected);
        assert!(connection.events.recv().await.is_none());

        let err = connection.session.leave_room().await.unwrap_err();
        assert!(matches!(err, ClientError::ConnectionLost(_)));
    }

    #[tokio::test]
    async fn test_search_hides_private_and_full_rooms() {
        let mut private = RoomSummary::new("Secret");
        private.private = true;
        let mock = MockClient::new()
            .with_room(RoomSummary::new("Lounge"))
            .with_room(private)
            .with_room(
                RoomSummary::new("Lobby")
                    .with_limit(1)
                    .with_member(Member::new(5, "x")),
            );
        let connection = mock.connect(&config(json!({}))).await.unwrap();

        let rooms = connection
            .session
            .search_rooms(&RoomQuery::default())
            .await
            .unwrap();
        let names: Vec<_> = rooms.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Lounge"]);

        let rooms = connection
            .session
            .search_rooms(&RoomQuery {
                query: "lo".to_string(),
                include_full: true,
            })
            .await
            .unwrap();
        assert_eq!(rooms.len(), 2);
    }
}
