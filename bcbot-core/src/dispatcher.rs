// ABOUTME: Command dispatcher executing chatroom, messaging and lookup operations on the live session.
// ABOUTME: Checks the Running precondition, validates arguments, bounds each call and maps failures.

use bcbot_client::{ClientResult, HistoryQuery, RoomParams, RoomQuery, RoomSummary};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

use crate::commands::{self, JoinChatroom, MemberLookup, SendChatMessage};
use crate::error::{BotError, BotResult};
use crate::metrics;
use crate::session::{LiveSession, SessionController};

/// Runs commands against whatever session the controller currently holds.
///
/// Commands do not take the lifecycle lock: a `stop` may race a command in
/// flight, in which case the command either completes (and a warning is
/// logged) or fails with ConnectionLost once the handle is closed.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    controller: SessionController,
    command_timeout: Duration,
}

impl CommandDispatcher {
    pub fn new(controller: SessionController, command_timeout: Duration) -> Self {
        Self {
            controller,
            command_timeout,
        }
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub async fn send_chat_message(&self, cmd: &SendChatMessage) -> BotResult<()> {
        let live = self.controller.live_session()?;
        cmd.validate()?;
        self.run(&live, "send_message", live.handle.send_message(&cmd.text))
            .await
    }

    pub async fn search_chatrooms(&self, query: &RoomQuery) -> BotResult<Vec<RoomSummary>> {
        let live = self.controller.live_session()?;
        commands::validate_search(query)?;
        self.run(&live, "search_rooms", live.handle.search_rooms(query))
            .await
    }

    pub async fn create_chatroom(&self, params: &RoomParams) -> BotResult<RoomSummary> {
        let live = self.controller.live_session()?;
        commands::validate_room_params(params)?;
        let room = self
            .run(&live, "create_room", live.handle.create_room(params))
            .await?;
        self.controller
            .set_chatroom(live.generation, Some(room.clone()));
        Ok(room)
    }

    pub async fn join_chatroom(&self, cmd: &JoinChatroom) -> BotResult<RoomSummary> {
        let live = self.controller.live_session()?;
        let name = cmd.validate()?;
        let room = self
            .run(&live, "join_room", live.handle.join_room(name))
            .await?;
        self.controller
            .set_chatroom(live.generation, Some(room.clone()));
        Ok(room)
    }

    /// Leave the current room. Returns the name of the room that was left, if known.
    pub async fn leave_chatroom(&self) -> BotResult<Option<String>> {
        let live = self.controller.live_session()?;
        let left = self
            .controller
            .current_chatroom()?
            .map(|room| room.name);
        self.run(&live, "leave_room", live.handle.leave_room())
            .await?;
        self.controller.set_chatroom(live.generation, None);
        Ok(left)
    }

    /// Served from the controller's cache; never contacts the service
    pub fn get_current_chatroom(&self) -> BotResult<Option<RoomSummary>> {
        self.controller.current_chatroom()
    }

    pub async fn get_chat_history(&self, query: &HistoryQuery) -> BotResult<Vec<Value>> {
        let live = self.controller.live_session()?;
        commands::validate_history(query)?;
        self.run(&live, "get_chat_history", live.handle.get_chat_history(query))
            .await
    }

    pub async fn query_account(&self, lookup: &MemberLookup) -> BotResult<Value> {
        let live = self.controller.live_session()?;
        let member_number = lookup.validate()?;
        self.run(&live, "query_account", live.handle.query_account(member_number))
            .await
    }

    pub async fn get_character_data(&self, lookup: &MemberLookup) -> BotResult<Value> {
        let live = self.controller.live_session()?;
        let member_number = lookup.validate()?;
        self.run(
            &live,
            "get_character_data",
            live.handle.get_character_data(member_number),
        )
        .await
    }

    pub async fn get_room_member_detail(&self, lookup: &MemberLookup) -> BotResult<Value> {
        let live = self.controller.live_session()?;
        let member_number = lookup.validate()?;
        self.run(
            &live,
            "get_room_member_detail",
            live.handle.get_room_member_detail(member_number),
        )
        .await
    }

    async fn run<T>(
        &self,
        live: &LiveSession,
        op: &'static str,
        call: impl Future<Output = ClientResult<T>>,
    ) -> BotResult<T> {
        let result = match tokio::time::timeout(self.command_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(BotError::from_command(e)),
            Err(_) => Err(BotError::Timeout(format!(
                "{} did not complete within {}s",
                op,
                self.command_timeout.as_secs_f64()
            ))),
        };

        match &result {
            Ok(_) => {
                metrics::record_command(op, "ok");
                if !self.controller.is_current(live.generation) {
                    tracing::warn!(op, "Command completed after its session ended");
                }
            }
            Err(err) => {
                metrics::record_command(op, err.kind().as_str());
                tracing::debug!(op, error = %err, "Command failed");
                if let BotError::ConnectionLost(reason) = err {
                    self.controller
                        .report_connection_lost(live.generation, reason);
                }
            }
        }
        result
    }
}
