// ABOUTME: Session lifecycle controller: the single owner of session state and the live handle.
// ABOUTME: Drives Stopped/Starting/Running/Stopping/Error and pumps inbound events into the buffer.

use bcbot_client::{
    BotConfig, ChatClient, Connection, EventKind, InboundEvent, Member, RoomSummary,
    SessionHandle,
};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::buffer::{EventBuffer, DEFAULT_EVENT_CAPACITY};
use crate::error::{BotError, BotResult, ErrorKind};
use crate::metrics;

/// Why the session ended up in `Error`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&BotError> for SessionFailure {
    fn from(err: &BotError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Error(SessionFailure),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Stopped => "stopped",
            SessionState::Starting => "starting",
            SessionState::Running => "running",
            SessionState::Stopping => "stopping",
            SessionState::Error(_) => "error",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, SessionState::Running)
    }

    /// Edges of the lifecycle state machine
    pub fn can_transition_to(&self, next: &SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Stopped, Starting)
                | (Error(_), Starting)
                | (Starting, Running)
                | (Starting, Error(_))
                | (Running, Stopping)
                | (Running, Error(_))
                | (Stopping, Stopped)
                | (Error(_), Stopped)
        )
    }

    pub fn failure(&self) -> Option<&SessionFailure> {
        match self {
            SessionState::Error(failure) => Some(failure),
            _ => None,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Error(failure) => write!(f, "error({})", failure.kind),
            other => f.write_str(other.name()),
        }
    }
}

impl Serialize for SessionState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Broadcast on every lifecycle transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub from: SessionState,
    pub to: SessionState,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Upper bound on the connect handshake
    pub start_timeout: Duration,
    /// Upper bound on the best-effort disconnect during stop
    pub disconnect_timeout: Duration,
    pub event_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            start_timeout: Duration::from_secs(30),
            disconnect_timeout: Duration::from_secs(5),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Metadata of the live session, reported while running
#[derive(Debug, Clone, Serialize)]
pub struct SessionDetails {
    pub client: String,
    pub username: String,
    pub player: Member,
    pub chatroom: Option<String>,
    pub member_count: usize,
    pub members: Vec<Member>,
    pub connected_since: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub running: bool,
    pub last_error: Option<SessionFailure>,
    pub session: Option<SessionDetails>,
    pub retained_events: usize,
}

/// What the dispatcher needs to issue one command: the handle plus the
/// generation it belongs to, so late results can be told apart.
#[derive(Debug, Clone)]
pub struct LiveSession {
    pub generation: u64,
    pub handle: SessionHandle,
}

struct ActiveSession {
    generation: u64,
    handle: SessionHandle,
    config: BotConfig,
    player: Member,
    chatroom: Option<RoomSummary>,
    connected_since: DateTime<Utc>,
    cancel: CancellationToken,
}

struct Guarded {
    state: SessionState,
    active: Option<ActiveSession>,
    generation: u64,
}

struct Inner {
    client: Arc<dyn ChatClient>,
    settings: SessionSettings,
    buffer: Arc<EventBuffer>,
    /// Serializes start and stop end to end
    lifecycle: tokio::sync::Mutex<()>,
    /// Sole home of the state and the live handle; never held across an await
    guarded: Mutex<Guarded>,
    transitions: broadcast::Sender<StateChange>,
}

/// Owner of the one bot session in this process. Cheap to clone.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    pub fn new(client: Arc<dyn ChatClient>, settings: SessionSettings) -> Self {
        let (transitions, _) = broadcast::channel(64);
        let buffer = Arc::new(EventBuffer::new(settings.event_capacity));
        Self {
            inner: Arc::new(Inner {
                client,
                settings,
                buffer,
                lifecycle: tokio::sync::Mutex::new(()),
                guarded: Mutex::new(Guarded {
                    state: SessionState::Stopped,
                    active: None,
                    generation: 0,
                }),
                transitions,
            }),
        }
    }

    pub fn buffer(&self) -> &Arc<EventBuffer> {
        &self.inner.buffer
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.inner.settings
    }

    pub fn client_name(&self) -> &'static str {
        self.inner.client.name()
    }

    /// Receive every state transition from now on
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.inner.transitions.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.lock().state.clone()
    }

    /// Connect and move to Running. Allowed from Stopped or Error.
    ///
    /// The attempt runs on its own task and settles in Running or Error
    /// even if the caller stops waiting for it.
    pub async fn start(&self, config: BotConfig) -> BotResult<()> {
        if matches!(
            self.state(),
            SessionState::Starting | SessionState::Running
        ) {
            return Err(BotError::AlreadyActive);
        }

        let this = self.clone();
        match tokio::spawn(async move { this.run_start(config).await }).await {
            Ok(result) => result,
            Err(e) => {
                let err = BotError::InternalError(format!("start task failed: {}", e));
                if self.state() == SessionState::Starting {
                    return Err(self.fail_start(err));
                }
                Err(err)
            }
        }
    }

    async fn run_start(&self, config: BotConfig) -> BotResult<()> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        {
            let mut guarded = self.lock();
            match guarded.state {
                SessionState::Stopped | SessionState::Error(_) => {}
                _ => return Err(BotError::AlreadyActive),
            }
            self.transition(&mut guarded, SessionState::Starting);
        }

        tracing::info!(
            client = self.client_name(),
            username = %config.username,
            server = %config.server_url,
            "Connecting bot session"
        );

        let timeout = self.inner.settings.start_timeout;
        let connection = match tokio::time::timeout(timeout, self.inner.client.connect(&config))
            .await
        {
            Ok(Ok(connection)) => connection,
            Ok(Err(e)) => return Err(self.fail_start(BotError::from_connect(e))),
            Err(_) => {
                return Err(self.fail_start(BotError::Timeout(format!(
                    "connect did not complete within {}s",
                    timeout.as_secs_f64()
                ))))
            }
        };

        let Connection {
            session,
            info,
            events,
        } = connection;

        self.inner.buffer.clear();
        metrics::set_retained_events(0);

        let handle = SessionHandle::spawn(session, self.client_name());
        let cancel = CancellationToken::new();
        let generation = {
            let mut guarded = self.lock();
            guarded.generation += 1;
            let generation = guarded.generation;
            guarded.active = Some(ActiveSession {
                generation,
                handle,
                config,
                player: info.player.clone(),
                chatroom: info.chatroom.clone(),
                connected_since: Utc::now(),
                cancel: cancel.clone(),
            });
            self.transition(&mut guarded, SessionState::Running);
            generation
        };

        tracing::info!(
            generation,
            player = %info.player.name,
            member_number = info.player.member_number,
            chatroom = ?info.chatroom.as_ref().map(|r| r.name.as_str()),
            "Bot session running"
        );

        tokio::spawn(pump_events(self.clone(), generation, events, cancel));
        Ok(())
    }

    /// Disconnect and move to Stopped. A no-op when already stopped.
    pub async fn stop(&self) -> BotResult<()> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        let active = {
            let mut guarded = self.lock();
            match guarded.state {
                SessionState::Stopped => return Ok(()),
                SessionState::Error(_) => {
                    let active = guarded.active.take();
                    self.transition(&mut guarded, SessionState::Stopped);
                    active
                }
                SessionState::Running => {
                    self.transition(&mut guarded, SessionState::Stopping);
                    guarded.active.take()
                }
                // start holds the lifecycle lock for its whole duration
                SessionState::Starting | SessionState::Stopping => return Ok(()),
            }
        };

        if let Some(active) = active {
            active.cancel.cancel();
            close_quietly(&active.handle, self.inner.settings.disconnect_timeout).await;
            tracing::debug!(username = %active.config.username, "Session released");
        }

        let mut guarded = self.lock();
        if guarded.state == SessionState::Stopping {
            self.transition(&mut guarded, SessionState::Stopped);
        }
        Ok(())
    }

    /// Snapshot of the current state. Never waits on lifecycle operations.
    pub fn status(&self) -> SessionStatus {
        let guarded = self.lock();
        let session = match (&guarded.state, &guarded.active) {
            (SessionState::Running, Some(active)) => {
                let mut members = active
                    .chatroom
                    .as_ref()
                    .map(|room| room.members.clone())
                    .unwrap_or_default();
                members.sort_by_key(|m| m.member_number);
                Some(SessionDetails {
                    client: self.client_name().to_string(),
                    username: active.config.username.clone(),
                    player: active.player.clone(),
                    chatroom: active.chatroom.as_ref().map(|room| room.name.clone()),
                    member_count: members.len(),
                    members,
                    connected_since: active.connected_since,
                })
            }
            _ => None,
        };

        SessionStatus {
            running: guarded.state.is_running(),
            last_error: guarded.state.failure().cloned(),
            state: guarded.state.clone(),
            session,
            retained_events: self.inner.buffer.len(),
        }
    }

    /// Handle to the running session, or NotConnected
    pub fn live_session(&self) -> BotResult<LiveSession> {
        let guarded = self.lock();
        match (&guarded.state, &guarded.active) {
            (SessionState::Running, Some(active)) => Ok(LiveSession {
                generation: active.generation,
                handle: active.handle.clone(),
            }),
            _ => Err(BotError::NotConnected),
        }
    }

    /// Whether `generation` is still the running session
    pub fn is_current(&self, generation: u64) -> bool {
        let guarded = self.lock();
        guarded.state.is_running()
            && guarded
                .active
                .as_ref()
                .is_some_and(|a| a.generation == generation)
    }

    /// Cached chatroom of the running session
    pub fn current_chatroom(&self) -> BotResult<Option<RoomSummary>> {
        let guarded = self.lock();
        match (&guarded.state, &guarded.active) {
            (SessionState::Running, Some(active)) => Ok(active.chatroom.clone()),
            _ => Err(BotError::NotConnected),
        }
    }

    /// Replace the tracked chatroom after a successful join, create or leave
    pub fn set_chatroom(&self, generation: u64, chatroom: Option<RoomSummary>) -> bool {
        let mut guarded = self.lock();
        match guarded.active.as_mut() {
            Some(active) if active.generation == generation => {
                active.chatroom = chatroom;
                true
            }
            _ => false,
        }
    }

    /// Apply a room snapshot from the event stream if it describes the tracked room
    fn refresh_chatroom(&self, generation: u64, room: RoomSummary) {
        let mut guarded = self.lock();
        if let Some(active) = guarded.active.as_mut() {
            if active.generation == generation
                && active.chatroom.as_ref().is_some_and(|r| r.name == room.name)
            {
                active.chatroom = Some(room);
            }
        }
    }

    /// Move a running session to Error(ConnectionLost) and release its handle.
    /// Ignored when `generation` is no longer the running session.
    pub fn report_connection_lost(&self, generation: u64, reason: &str) -> bool {
        let active = {
            let mut guarded = self.lock();
            let current = guarded.state.is_running()
                && guarded
                    .active
                    .as_ref()
                    .is_some_and(|a| a.generation == generation);
            if !current {
                return false;
            }
            let failure = SessionFailure::from(&BotError::ConnectionLost(reason.to_string()));
            self.transition(&mut guarded, SessionState::Error(failure));
            guarded.active.take()
        };

        tracing::error!(generation, reason, "Bot session lost its connection");

        if let Some(active) = active {
            active.cancel.cancel();
            let timeout = self.inner.settings.disconnect_timeout;
            tokio::spawn(async move {
                close_quietly(&active.handle, timeout).await;
            });
        }
        true
    }

    fn fail_start(&self, err: BotError) -> BotError {
        tracing::warn!(error = %err, "Bot session failed to start");
        let mut guarded = self.lock();
        self.transition(&mut guarded, SessionState::Error(SessionFailure::from(&err)));
        err
    }

    fn transition(&self, guarded: &mut MutexGuard<'_, Guarded>, next: SessionState) {
        let from = guarded.state.clone();
        debug_assert!(
            from.can_transition_to(&next),
            "invalid transition {} -> {}",
            from,
            next
        );
        tracing::info!(from = %from, state = %next, "Session state changed");
        metrics::record_transition(next.name());
        guarded.state = next.clone();
        let _ = self.inner.transitions.send(StateChange { from, to: next });
    }

    fn lock(&self) -> MutexGuard<'_, Guarded> {
        self.inner.guarded.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("client", &self.client_name())
            .field("state", &self.state())
            .field("buffer", &self.inner.buffer)
            .finish()
    }
}

async fn close_quietly(handle: &SessionHandle, timeout: Duration) {
    match tokio::time::timeout(timeout, handle.close()).await {
        Ok(Ok(())) => tracing::debug!("Session disconnected"),
        Ok(Err(e)) => tracing::warn!(error = %e, "Disconnect failed; releasing session anyway"),
        Err(_) => tracing::warn!(
            timeout_secs = timeout.as_secs_f64(),
            "Disconnect timed out; releasing session anyway"
        ),
    }
}

/// Move inbound events into the buffer until the session ends
async fn pump_events(
    controller: SessionController,
    generation: u64,
    mut events: mpsc::Receiver<InboundEvent>,
    cancel: CancellationToken,
) {
    let buffer = Arc::clone(controller.buffer());
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = events.recv() => event,
        };

        let Some(event) = event else {
            controller.report_connection_lost(generation, "event stream closed");
            break;
        };
        if !controller.is_current(generation) {
            break;
        }

        let kind = event.kind;
        if kind == EventKind::RoomUpdate {
            if let Ok(room) = serde_json::from_value::<RoomSummary>(event.payload.clone()) {
                controller.refresh_chatroom(generation, room);
            }
        }
        let fatal_reason = kind
            .is_fatal()
            .then(|| event.reason().unwrap_or("server closed the connection").to_string());

        let sequence = buffer.ingest(event);
        metrics::record_event_ingested(kind.as_str());
        metrics::set_retained_events(buffer.len());
        tracing::trace!(sequence, kind = kind.as_str(), "Event ingested");

        if let Some(reason) = fatal_reason {
            controller.report_connection_lost(generation, &reason);
            break;
        }
    }
    tracing::debug!(generation, "Event pump stopped");
}
